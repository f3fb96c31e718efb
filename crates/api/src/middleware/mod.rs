//! Request extractors for authentication ([`auth::AuthUser`]) and role
//! gates ([`rbac::RequireAdmin`], [`rbac::RequireAuth`]).

pub mod auth;
pub mod rbac;
