pub mod error;
pub mod repository;

pub use error::LockError;
pub use repository::{LockInfo, LockRepository, ScopedLock};
