//! Database module for towerwatch.
//!
//! Provides the SQLite tower registry with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
