//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where the table is written to, the DTOs used for inserts.

pub mod global_policy;
pub mod resource_mapping;
pub mod time_window;
pub mod user;
