use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("script id failed sanitization: {0}")]
    InvalidId(String),

    #[error("script not found: {0}")]
    NotFound(String),

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("suite references unknown test id: {0}")]
    InvalidReference(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
