//! Per-run `${name}` variable scope.
//!
//! `storeText` and `executeScript` write into it; every command field is
//! substituted against it before use.

use std::collections::HashMap;

use crate::error::ExecutorError;

#[derive(Debug, Default, Clone)]
pub struct VariableScope {
    values: HashMap<String, String>,
}

impl VariableScope {
    pub fn new() -> Self {
        VariableScope::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replaces every `${name}` occurrence in `text` with its bound value.
    /// An unbound name fails the whole substitution, matching "no further
    /// commands run" — the caller is expected to abort on this error.
    pub fn substitute(&self, command_id: &str, text: &str) -> Result<String, ExecutorError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start..].find('}') else {
                out.push_str(rest);
                rest = "";
                break;
            };
            let end = start + end;
            out.push_str(&rest[..start]);
            let name = &rest[start + 2..end];
            let value = self.get(name).ok_or_else(|| ExecutorError::UnboundVariable {
                command_id: command_id.to_string(),
                name: name.to_string(),
            })?;
            out.push_str(value);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
