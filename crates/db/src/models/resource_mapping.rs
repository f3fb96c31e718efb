use serde::Serialize;
use sqlx::FromRow;
use windowgate_core::deployment_window::ProfileMapping;
use windowgate_core::types::{DbId, Timestamp};

/// A row from the `resource_qualifier_mappings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResourceQualifierMapping {
    pub id: DbId,
    pub resource_id: DbId,
    pub resource_type: String,
    pub app_id: DbId,
    pub env_id: DbId,
    pub active: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ResourceQualifierMapping {
    pub fn to_profile_mapping(&self) -> ProfileMapping {
        ProfileMapping {
            profile_id: self.resource_id,
            app_id: self.app_id,
            env_id: self.env_id,
        }
    }
}
