use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no session with id {0} is known to the pool")]
    NoSuchSession(String),

    #[error("session {0} is dead and could not be replaced")]
    SessionDead(String),

    #[error("grid at {0} did not respond within the warm-up timeout")]
    GridUnreachable(String),

    #[error("webdriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("failed to start webdriver session: {0}")]
    NewSession(#[from] fantoccini::error::NewSessionError),

    #[error("locator {0:?} could not be resolved")]
    BadLocator(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
