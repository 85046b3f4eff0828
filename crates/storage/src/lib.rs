#![forbid(unsafe_code)]

pub mod content;
pub mod files;
pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryRepository, ProgressRepository, Storage, StorageError};
