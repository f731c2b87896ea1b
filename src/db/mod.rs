//! Database module: query descriptors, view models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: query descriptors and view models passed to and returned by repositories.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `faq_accordion::db`; the repository
//! API and commonly used models are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{AdminListQuery, AdminOrderBy, AdminRow, EntryQuery, SortDirection};
