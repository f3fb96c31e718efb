//! Domain core for the deployment window gate.
//!
//! Pure, I/O-free building blocks shared by the persistence adapters and the
//! HTTP layer: the profile data model, recurring time-range arithmetic and the
//! composition rules that turn a set of profiles into a deploy verdict.

pub mod deployment_window;
pub mod error;
pub mod roles;
pub mod types;
