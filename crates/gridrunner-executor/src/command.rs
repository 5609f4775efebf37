//! Translates one script [`Command`] into a call against a [`GridClient`].

use std::time::Duration;

use gridrunner_core::script::Command;
use gridrunner_pool::{GridClient, PoolError, ScriptLocator};
use tokio::time::Instant;
use tracing::trace;

use crate::error::ExecutorError;
use crate::keys;
use crate::variables::VariableScope;

/// Polls `attempt` at a fixed interval until it succeeds or `implicit_wait`
/// elapses, at which point the last error is returned. Used by every
/// command that resolves a locator, so a momentarily-missing element
/// doesn't fail a script that would succeed a beat later.
async fn poll_until<F, Fut, T>(implicit_wait: Duration, mut attempt: F) -> Result<T, PoolError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PoolError>>,
{
    let deadline = Instant::now() + implicit_wait;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(err);
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

fn resolve_window_size(command_id: &str, target: &str) -> Result<(i32, i32), ExecutorError> {
    let (w, h) = target.split_once('x').or_else(|| target.split_once('X')).ok_or_else(|| {
        ExecutorError::CommandFailed {
            command_id: command_id.to_string(),
            command: "setWindowSize".to_string(),
            message: format!("expected target in WxH form, got {target:?}"),
        }
    })?;
    let parse = |s: &str| {
        s.trim().parse::<i32>().map_err(|_| ExecutorError::CommandFailed {
            command_id: command_id.to_string(),
            command: "setWindowSize".to_string(),
            message: format!("expected an integer dimension, got {s:?}"),
        })
    };
    Ok((parse(w)?, parse(h)?))
}

fn resolve_url(base_url: Option<&str>, target: &str) -> String {
    if target.contains("://") || base_url.is_none() {
        return target.to_string();
    }
    let base = base_url.unwrap().trim_end_matches('/');
    let path = target.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Executes one command. `base_url` resolves relative `open` targets;
/// `implicit_wait` bounds how long locator-resolving commands retry before
/// failing.
pub async fn execute(
    client: &mut dyn GridClient,
    scope: &mut VariableScope,
    base_url: Option<&str>,
    implicit_wait: Duration,
    command: &Command,
) -> Result<(), ExecutorError> {
    let command_id = command.id.clone();
    let target = scope.substitute(&command_id, &command.target)?;
    // `sendKeys` values carry two distinct `${...}` vocabularies: fixed
    // KEY_* tokens and real variable references. KEY_* tokens must expand
    // first, since `VariableScope::substitute` would otherwise reject them
    // as unbound; anything `keys::expand` doesn't recognize passes through
    // untouched for substitution to handle.
    let value = if command.command == "sendKeys" {
        let expanded = keys::expand(&command.value);
        scope.substitute(&command_id, &expanded)?
    } else {
        scope.substitute(&command_id, &command.value)?
    };

    trace!(command_id = %command_id, command = %command.command, "executing command");

    let failed = |message: String| ExecutorError::CommandFailed {
        command_id: command_id.clone(),
        command: command.command.clone(),
        message,
    };
    let grid_unreachable =
        |source: PoolError| ExecutorError::GridUnreachable { command_id: command_id.clone(), source };

    match command.command.as_str() {
        "open" => {
            let url = resolve_url(base_url, &target);
            client.goto(&url).await.map_err(grid_unreachable)
        }

        "click" => {
            let locator = locator_for(&command_id, &target)?;
            poll_until(implicit_wait, || client.click(&locator)).await.map_err(grid_unreachable)
        }

        "clickAndWait" => {
            let locator = locator_for(&command_id, &target)?;
            poll_until(implicit_wait, || client.click(&locator)).await.map_err(grid_unreachable)?;
            wait_for_document_complete(client, implicit_wait).await.map_err(grid_unreachable)
        }

        "type" => {
            let locator = locator_for(&command_id, &target)?;
            poll_until(implicit_wait, || client.type_text(&locator, &value))
                .await
                .map_err(grid_unreachable)
        }

        "sendKeys" => {
            let locator = locator_for(&command_id, &target)?;
            poll_until(implicit_wait, || client.send_keys_raw(&locator, &value))
                .await
                .map_err(grid_unreachable)
        }

        "pause" => {
            let millis_str = if target.is_empty() { &value } else { &target };
            let millis: u64 = millis_str
                .trim()
                .parse()
                .map_err(|_| failed(format!("expected a millisecond count, got {millis_str:?}")))?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(())
        }

        "mouseOver" => {
            let locator = locator_for(&command_id, &target)?;
            poll_until(implicit_wait, || client.mouse_over(&locator)).await.map_err(grid_unreachable)
        }

        "setWindowSize" => {
            let (w, h) = resolve_window_size(&command_id, &target)?;
            client.set_window_size(w, h).await.map_err(grid_unreachable)
        }

        "assertText" => {
            let locator = locator_for(&command_id, &target)?;
            let mut last = String::new();
            let result = poll_until(implicit_wait, || {
                let client = &mut *client;
                let locator = &locator;
                let value = &value;
                let last = &mut last;
                async move {
                    let text = client.find_text(locator).await?;
                    *last = text.clone();
                    if text == *value {
                        Ok(())
                    } else {
                        Err(PoolError::BadLocator(locator.original().to_string()))
                    }
                }
            })
            .await;
            result.map_err(|_| {
                ExecutorError::AssertionFailed {
                    command_id: command_id.clone(),
                    command: command.command.clone(),
                    message: format!("expected {value:?}, found {last:?}"),
                }
            })
        }

        "assertElementPresent" => {
            let locator = locator_for(&command_id, &target)?;
            let present = poll_until(implicit_wait, || async {
                if client.find_present(&locator).await? {
                    Ok(())
                } else {
                    Err(PoolError::BadLocator(locator.original().to_string()))
                }
            })
            .await
            .is_ok();
            if present {
                Ok(())
            } else {
                Err(ExecutorError::AssertionFailed {
                    command_id: command_id.clone(),
                    command: command.command.clone(),
                    message: format!("element {target:?} not present within implicit wait"),
                })
            }
        }

        "storeText" => {
            let locator = locator_for(&command_id, &target)?;
            let text = poll_until(implicit_wait, || client.find_text(&locator))
                .await
                .map_err(grid_unreachable)?;
            if !value.is_empty() {
                scope.bind(value, text);
            }
            Ok(())
        }

        "executeScript" => {
            let result = client.execute_script(&target, vec![]).await.map_err(grid_unreachable)?;
            if !value.is_empty() {
                let rendered = match result {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                scope.bind(value, rendered);
            }
            Ok(())
        }

        other => Err(failed(format!("unrecognized command {other:?}"))),
    }
}

async fn wait_for_document_complete(
    client: &mut dyn GridClient,
    implicit_wait: Duration,
) -> Result<(), PoolError> {
    let deadline = Instant::now() + implicit_wait;
    loop {
        let ready =
            client.execute_script("return document.readyState;", vec![]).await.unwrap_or_default();
        if ready.as_str() == Some("complete") {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn locator_for(command_id: &str, target: &str) -> Result<ScriptLocator, ExecutorError> {
    if target.is_empty() {
        return Err(ExecutorError::BadLocator { command_id: command_id.to_string(), target: target.to_string() });
    }
    ScriptLocator::parse(target).map_err(|_| ExecutorError::BadLocator {
        command_id: command_id.to_string(),
        target: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridrunner_pool::FakeClient;

    fn cmd(command: &str, target: &str, value: &str) -> Command {
        Command {
            id: "c1".to_string(),
            command: command.to_string(),
            target: target.to_string(),
            value: value.to_string(),
            comment: None,
        }
    }

    #[tokio::test]
    async fn send_keys_expands_key_tokens_before_variable_substitution() {
        let mut client = FakeClient::new();
        let mut scope = VariableScope::new();
        scope.bind("name".to_string(), "Bob".to_string());

        let command = cmd("sendKeys", "id=search", "${name}${KEY_ENTER}");
        execute(&mut client, &mut scope, None, Duration::from_millis(50), &command).await.unwrap();

        let snapshot = client.snapshot();
        assert_eq!(snapshot.typed, vec![("id=search".to_string(), "Bob\u{e007}".to_string())]);
    }

    #[tokio::test]
    async fn send_keys_with_only_a_key_token_does_not_raise_unbound_variable() {
        let mut client = FakeClient::new();
        let mut scope = VariableScope::new();

        let command = cmd("sendKeys", "id=search", "${KEY_TAB}");
        let result = execute(&mut client, &mut scope, None, Duration::from_millis(50), &command).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unknown_locator_prefix_fails_with_bad_locator() {
        let mut client = FakeClient::new();
        let mut scope = VariableScope::new();

        let command = cmd("click", "frobnicate=thing", "");
        let err = execute(&mut client, &mut scope, None, Duration::from_millis(50), &command).await.unwrap_err();
        assert!(matches!(err, ExecutorError::BadLocator { .. }));
    }

    #[tokio::test]
    async fn type_substitutes_a_bound_variable() {
        let mut client = FakeClient::new();
        let mut scope = VariableScope::new();
        scope.bind("name".to_string(), "Bob".to_string());

        let command = cmd("type", "id=username", "${name}");
        execute(&mut client, &mut scope, None, Duration::from_millis(50), &command).await.unwrap();

        let snapshot = client.snapshot();
        assert_eq!(snapshot.typed, vec![("id=username".to_string(), "Bob".to_string())]);
    }
}
