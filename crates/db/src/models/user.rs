//! Read-only view of the user directory.

use serde::Serialize;
use sqlx::FromRow;
use windowgate_core::types::DbId;

/// Identity and contact address of a user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub email_id: String,
}
