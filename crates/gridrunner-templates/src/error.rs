use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template render failed at {location}: {message}")]
    Render { message: String, location: String },

    #[error("template resource unavailable: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
