pub mod error;
pub mod loader;
pub mod script;
pub mod store;

pub use error::CoreError;
pub use loader::ScriptLoader;
pub use script::{Command, Project, Suite, Test};
pub use store::ScriptStore;
