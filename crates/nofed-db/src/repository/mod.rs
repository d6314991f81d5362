//! Repository layer: SQL for each bridge table.
//!
//! Free functions over a `PgPool`, non-macro queries, one statement each.

pub mod cache;
pub mod followers;
pub mod keys;
pub mod notes;
