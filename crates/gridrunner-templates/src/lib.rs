pub mod error;
pub mod helpers;
pub mod renderer;

pub use error::TemplateError;
pub use renderer::Renderer;
