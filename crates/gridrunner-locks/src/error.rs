use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock already held: {0}")]
    AlreadyHeld(String),

    #[error("caller does not hold the lock on {0}")]
    NotOwner(String),

    #[error("timed out waiting for lock on {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock info corrupted: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, LockError>;
