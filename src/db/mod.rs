//! Database module for sitewatch.
//!
//! Provides the SQLite observation store and the site registry types.

mod models;
mod store;

pub use models::*;
pub use store::*;
