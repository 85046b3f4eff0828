#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod model;

pub use catalog::{CatalogPosition, ProblemCatalog, ProblemGroup, group_by};
pub use error::Error;
