use thiserror::Error;

use gridrunner_core::CoreError;
use gridrunner_locks::LockError;
use gridrunner_pool::PoolError;
use gridrunner_templates::TemplateError;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("command {command_id} used an unrecognized locator prefix: {target}")]
    BadLocator { command_id: String, target: String },

    #[error("command {command_id} referenced unbound variable ${{{name}}}")]
    UnboundVariable { command_id: String, name: String },

    #[error("command {command_id} ({command}) failed an assertion: {message}")]
    AssertionFailed { command_id: String, command: String, message: String },

    #[error("command {command_id} ({command}) failed: {message}")]
    CommandFailed { command_id: String, command: String, message: String },

    #[error("grid unreachable while running command {command_id}: {source}")]
    GridUnreachable { command_id: String, #[source] source: PoolError },
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Unifies every failure kind a dispatcher call can surface, per the error
/// taxonomy shared by every layer beneath it.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("no idle session available")]
    NoCapacity,

    #[error("project has no test or suite named {0:?}")]
    UnknownSelection(String),
}
