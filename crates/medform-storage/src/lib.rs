//! medform-storage
//!
//! Fragment persistence. One trait, [`PersistenceGateway`], plus an in-memory
//! store for tests and embedding and a directory of JSON files for the CLI.

pub mod error;
pub mod file;
pub mod gateway;
pub mod memory;

pub use error::StorageError;
pub use file::JsonFileGateway;
pub use gateway::{BoxFuture, PersistenceGateway};
pub use memory::InMemoryGateway;
