//! Rows of the generic `global_policies` store.

use serde::Serialize;
use sqlx::FromRow;
use windowgate_core::types::{DbId, Timestamp};

/// A row from the `global_policies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GlobalPolicy {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub policy_of: String,
    pub version: String,
    pub enabled: bool,
    pub deleted: bool,
    pub json_data: serde_json::Value,
    pub created_by: Option<DbId>,
    pub updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a policy.
#[derive(Debug, Clone)]
pub struct CreateGlobalPolicy {
    pub name: String,
    pub description: String,
    pub policy_of: String,
    pub enabled: bool,
    pub json_data: serde_json::Value,
    pub created_by: DbId,
}

/// DTO for a full replacement of a policy's mutable fields.
#[derive(Debug, Clone)]
pub struct UpdateGlobalPolicy {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub json_data: serde_json::Value,
    pub updated_by: DbId,
}
