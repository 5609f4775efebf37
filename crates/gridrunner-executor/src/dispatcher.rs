//! Execution Dispatcher (C8): policy layer gluing the pool, lock repository,
//! script store and renderer together.

use std::time::{Duration, Instant};

use gridrunner_core::script::{Project, Test};
use gridrunner_core::{ScriptLoader, ScriptStore};
use gridrunner_locks::LockRepository;
use gridrunner_pool::SessionPool;
use gridrunner_templates::Renderer;
use tracing::{info, instrument, warn};

use crate::command;
use crate::error::{DispatchError, ExecutorError};
use crate::report::{CommandOutcome, ExecutionReport};
use crate::request::ExecutionRequest;
use crate::variables::VariableScope;

/// The TTLs and wait budgets the dispatcher applies to each entry point.
/// Mirrors the Configuration table: `default_lock_ttl_s`,
/// `stream_lock_ttl_s`, `implicit_wait_s`.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub run_lock_ttl: Duration,
    pub stream_lock_ttl: Duration,
    pub executor_on_wait_timeout: Duration,
    pub implicit_wait: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        DispatcherSettings {
            run_lock_ttl: Duration::from_secs(300),
            stream_lock_ttl: Duration::from_secs(3600),
            executor_on_wait_timeout: Duration::from_secs(30),
            implicit_wait: Duration::from_secs(10),
        }
    }
}

/// A pinned connection's lock ownership, handed back to the caller so it can
/// drive further commands on the same session and eventually release it.
pub struct StreamHandle {
    pub session_id: String,
    token: String,
}

pub struct Dispatcher {
    store: ScriptStore,
    renderer: Renderer,
    locks: LockRepository,
    pool: SessionPool,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        store: ScriptStore,
        renderer: Renderer,
        locks: LockRepository,
        pool: SessionPool,
        settings: DispatcherSettings,
    ) -> Self {
        Dispatcher { store, renderer, locks, pool, settings }
    }

    fn load_project(
        &self,
        script_id: &str,
        params: &std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<Project, DispatchError> {
        let raw = self.store.get(script_id)?;
        let rendered = self.renderer.render(&raw, params)?;
        Ok(ScriptLoader::load(&rendered)?)
    }

    /// Resolves the ordered list of tests an `ExecutionRequest` selects: the
    /// named test, the named suite's tests, or the project's first suite.
    fn select_tests<'p>(
        &self,
        project: &'p Project,
        req: &ExecutionRequest,
    ) -> Result<Vec<&'p Test>, DispatchError> {
        if let Some(test_name) = &req.test {
            let test = project
                .test_by_name(test_name)
                .ok_or_else(|| DispatchError::UnknownSelection(test_name.clone()))?;
            return Ok(vec![test]);
        }
        let suite = match &req.suite {
            Some(name) => project
                .suite_by_name(name)
                .ok_or_else(|| DispatchError::UnknownSelection(name.clone()))?,
            None => project
                .suites
                .first()
                .ok_or_else(|| DispatchError::UnknownSelection("<no suites>".to_string()))?,
        };
        Ok(project.tests_for_suite(suite))
    }

    async fn run_tests(
        &self,
        client: &mut dyn gridrunner_pool::GridClient,
        base_url: Option<&str>,
        tests: &[&Test],
    ) -> (Vec<CommandOutcome>, Option<ExecutorError>) {
        let mut scope = VariableScope::new();
        let mut outcomes = Vec::new();
        let mut failure = None;
        'tests: for test in tests {
            for cmd in &test.commands {
                let started = Instant::now();
                let result =
                    command::execute(client, &mut scope, base_url, self.settings.implicit_wait, cmd)
                        .await;
                let duration = started.elapsed();
                match result {
                    Ok(()) => outcomes.push(CommandOutcome {
                        command_id: cmd.id.clone(),
                        ok: true,
                        error: None,
                        duration,
                    }),
                    Err(err) => {
                        outcomes.push(CommandOutcome {
                            command_id: cmd.id.clone(),
                            ok: false,
                            error: Some(err.to_string()),
                            duration,
                        });
                        failure = Some(err);
                        break 'tests;
                    }
                }
            }
        }
        (outcomes, failure)
    }

    async fn run_selected(
        &self,
        session_id: &str,
        project: &Project,
        req: &ExecutionRequest,
    ) -> Result<ExecutionReport, DispatchError> {
        let tests = self.select_tests(project, req)?;
        let mut guard = self.pool.acquire(session_id).await?;
        let (outcomes, failure) =
            self.run_tests(guard.client_mut(), project.default_url.as_deref(), &tests).await;
        let page_source = guard.client_mut().page_source().await.unwrap_or_default();
        if let Some(err) = failure {
            warn!(session_id, error = %err, "execution aborted on command failure");
            return Err(DispatchError::Executor(err));
        }
        Ok(ExecutionReport { page_source, outcomes, session_id: session_id.to_string() })
    }

    /// Auto-selects an idle session, then loads, renders and runs the
    /// requested test or suite against it.
    #[instrument(skip(self, req), fields(script_id = %req.script_id))]
    pub async fn execute_any(&self, req: ExecutionRequest) -> Result<ExecutionReport, DispatchError> {
        let sessions = self.pool.list().await;
        let idle = self.locks.filter_idle(&sessions).await?;
        if idle.is_empty() {
            return Err(DispatchError::NoCapacity);
        }

        let mut scoped = None;
        for id in &idle {
            match self.locks.acquire_scoped(id, self.settings.run_lock_ttl, Duration::ZERO).await {
                Ok(lock) => {
                    scoped = Some((id.clone(), lock));
                    break;
                }
                Err(_) => continue,
            }
        }
        let Some((session_id, lock)) = scoped else {
            return Err(DispatchError::NoCapacity);
        };

        let project = self.load_project(&req.script_id, &req.params)?;
        let result = self.run_selected(&session_id, &project, &req).await;
        lock.release().await?;
        result
    }

    /// Same as [`Self::execute_any`] but the session is caller-specified;
    /// waits up to `executor_on_wait_timeout` for the session to free up
    /// rather than moving on to another one.
    #[instrument(skip(self, req), fields(script_id = %req.script_id))]
    pub async fn execute_on(
        &self,
        session_id: &str,
        req: ExecutionRequest,
    ) -> Result<ExecutionReport, DispatchError> {
        let lock = self
            .locks
            .acquire_scoped(session_id, self.settings.run_lock_ttl, self.settings.executor_on_wait_timeout)
            .await?;
        let project = self.load_project(&req.script_id, &req.params)?;
        let result = self.run_selected(session_id, &project, &req).await;
        lock.release().await?;
        result
    }

    /// Picks an idle session and acquires an owner-held lock whose lifetime
    /// outlives this call. The caller drives further commands with
    /// [`Self::execute_on_stream`] and must eventually call
    /// [`Self::close_stream`]; if it never does, the TTL reclaims the lock.
    #[instrument(skip(self))]
    pub async fn open_stream(&self) -> Result<StreamHandle, DispatchError> {
        let sessions = self.pool.list().await;
        let idle = self.locks.filter_idle(&sessions).await?;
        let session_id = idle.first().cloned().ok_or(DispatchError::NoCapacity)?;
        let (token, _info) = self.locks.acquire(&session_id, self.settings.stream_lock_ttl).await?;
        info!(session_id, "stream pinned");
        Ok(StreamHandle { session_id, token })
    }

    /// Runs one already-rendered project's selected test(s) on a pinned
    /// stream's session, without touching the lock (it persists across
    /// messages).
    pub async fn execute_on_stream(
        &self,
        stream: &StreamHandle,
        project: &Project,
        req: &ExecutionRequest,
    ) -> Result<ExecutionReport, DispatchError> {
        self.run_selected(&stream.session_id, project, req).await
    }

    /// Releases the pinned lock. Errors are returned verbatim, matching the
    /// rule that the dispatcher never swallows lock errors.
    pub async fn close_stream(&self, stream: StreamHandle) -> Result<(), DispatchError> {
        self.locks.release(&stream.session_id, &stream.token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gridrunner_pool::{FakeClient, GridClient, SessionFactory};
    use std::sync::Arc;

    struct ScriptedFactory {
        page_source: String,
    }

    #[async_trait]
    impl SessionFactory for ScriptedFactory {
        async fn create(&self) -> gridrunner_pool::error::Result<Box<dyn GridClient>> {
            Ok(Box::new(FakeClient::new().with_page_source(self.page_source.clone())))
        }
    }

    fn dispatcher_with(
        tmp: &tempfile::TempDir,
        page_source: &str,
        settings: DispatcherSettings,
    ) -> Dispatcher {
        let store = ScriptStore::new(tmp.path().join("sides"));
        let locks = LockRepository::new(tmp.path().join("locks"));
        let renderer = Renderer::with_seed(tmp.path().join("js"), 42);
        let pool = SessionPool::new(
            Arc::new(ScriptedFactory { page_source: page_source.to_string() }),
            Duration::from_secs(5),
        );
        Dispatcher::new(store, renderer, locks, pool, settings)
    }

    const LOGIN_SCRIPT: &str = r#"{
        "id": "login", "name": "Login", "url": "https://example.test",
        "tests": [{"id": "t1", "name": "Login", "commands": [
            {"id": "c1", "command": "open", "target": "/"},
            {"id": "c2", "command": "type", "target": "id=u", "value": "{{ param.name }}"},
            {"id": "c3", "command": "click", "target": "id=go"}
        ]}],
        "suites": [{"id": "s1", "name": "Default", "tests": ["t1"]}]
    }"#;

    #[tokio::test]
    async fn happy_path_runs_every_command_and_returns_page_source() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&tmp, "<html>ok</html>", DispatcherSettings::default());
        dispatcher.store.save("login", LOGIN_SCRIPT).unwrap();
        dispatcher.pool.warm_up(1).await.unwrap();

        let mut params = std::collections::HashMap::new();
        params.insert("name".to_string(), serde_json::Value::String("Bob".to_string()));
        let req = ExecutionRequest { script_id: "login".to_string(), suite: None, test: None, params };

        let report = dispatcher.execute_any(req).await.unwrap();
        assert!(report.page_source.contains("<html"));
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes.iter().all(|o| o.ok));
        assert!(!dispatcher.locks.is_held(&report.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn busy_session_is_skipped_in_favor_of_an_idle_one() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&tmp, "<html></html>", DispatcherSettings::default());
        dispatcher.store.save("login", LOGIN_SCRIPT).unwrap();
        dispatcher.pool.warm_up(2).await.unwrap();
        let ids = dispatcher.pool.list().await;

        let busy = dispatcher.locks.acquire(&ids[0], Duration::from_secs(60)).await.unwrap();

        let req = ExecutionRequest {
            script_id: "login".to_string(),
            suite: None,
            test: None,
            params: std::collections::HashMap::new(),
        };
        let report = dispatcher.execute_any(req).await.unwrap();
        assert_eq!(report.session_id, ids[1]);
        dispatcher.locks.release(&ids[0], &busy.0).await.unwrap();
    }

    #[tokio::test]
    async fn no_idle_sessions_returns_no_capacity_without_touching_locks() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&tmp, "", DispatcherSettings::default());
        let req = ExecutionRequest {
            script_id: "login".to_string(),
            suite: None,
            test: None,
            params: std::collections::HashMap::new(),
        };
        let err = dispatcher.execute_any(req).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoCapacity));
    }

    #[tokio::test]
    async fn pinned_stream_orphan_is_reclaimed_by_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = DispatcherSettings::default();
        settings.stream_lock_ttl = Duration::from_millis(200);
        let dispatcher = dispatcher_with(&tmp, "<html></html>", settings);
        dispatcher.pool.warm_up(1).await.unwrap();

        let stream = dispatcher.open_stream().await.unwrap();
        assert!(dispatcher.locks.is_held(&stream.session_id).await.unwrap());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!dispatcher.locks.is_held(&stream.session_id).await.unwrap());
    }
}
