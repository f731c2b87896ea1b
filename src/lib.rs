//! FAQ entries rendered as an accordion, with categories, ordering and an
//! admin surface for duplicating and reordering entries.

pub mod accordion;
pub mod admin;
pub mod assets;
pub mod config;
pub mod content;
pub mod db;
pub mod escape;
pub mod model;
pub mod schema;
pub mod shortcode;
pub mod site;
pub mod store;
