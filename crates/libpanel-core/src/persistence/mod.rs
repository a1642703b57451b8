//! Persistence layer for library elements
//!
//! Provides SQLite-backed storage for elements, dashboard connections and
//! the users referenced by element metadata.

pub(crate) mod repository;
mod schema;

pub use repository::Repository;
pub use schema::{Schema, SCHEMA_VERSION};
