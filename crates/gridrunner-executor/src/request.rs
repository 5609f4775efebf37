use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// `{script_id, suite?, test?, params?}` — at most one of `suite`/`test` is
/// expected to be set; if both are absent the project's first suite runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRequest {
    pub script_id: String,
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}
