use serde::Serialize;
use sqlx::FromRow;
use windowgate_core::types::{DbId, Timestamp};

/// A row from the `timeout_window_mappings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TimeoutWindowMapping {
    pub id: DbId,
    pub resource_id: DbId,
    pub resource_type: String,
    pub expression_format: String,
    pub window_expression: serde_json::Value,
    pub sort_order: i32,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
