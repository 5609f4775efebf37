use std::time::Duration;

use serde::Serialize;

/// A per-command execution record, gathered as the executor loops over a
/// test's commands.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub command_id: String,
    pub ok: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

/// The dispatcher's success return value. `page_source` is the final page
/// source the spec documents as the execution's result; `outcomes` and
/// `session_id` are additive observability the dispatcher already has on
/// hand from the per-command loop.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub page_source: String,
    pub outcomes: Vec<CommandOutcome>,
    pub session_id: String,
}
