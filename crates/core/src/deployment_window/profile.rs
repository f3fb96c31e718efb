//! Deployment window profiles, their policy-store encoding and mappings.
//!
//! A profile is persisted as a generic global policy row (name, description,
//! enabled flag) whose opaque JSON blob is a [`DeploymentWindowPolicy`]. Its
//! windows live separately in the window-mapping store.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::time_range::parse_time_zone;
use super::window::TimeWindow;
use crate::error::CoreError;
use crate::types::DbId;

/// `policy_of` value of deployment window profiles in the global policy store.
pub const GLOBAL_POLICY_TYPE_DEPLOYMENT_WINDOW: &str = "DEPLOYMENT_WINDOW";

/// `resource_type` of profiles in the window and resource mapping stores.
pub const RESOURCE_TYPE_DEPLOYMENT_WINDOW_PROFILE: &str = "DEPLOYMENT_WINDOW_PROFILE";

// ---------------------------------------------------------------------------
// Profile type
// ---------------------------------------------------------------------------

/// Semantics of a profile's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentWindowType {
    /// Deployments are forbidden while a window is active.
    Blackout,
    /// Deployments are permitted only while a window is active.
    Maintenance,
}

impl DeploymentWindowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blackout => "BLACKOUT",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for DeploymentWindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// A named collection of windows bound to a type and an exclusion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWindowProfile {
    #[serde(default)]
    pub id: DbId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    #[serde(rename = "type")]
    pub window_type: DeploymentWindowType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub time_zone: String,
    #[serde(default)]
    pub display_message: String,
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
    #[serde(default)]
    pub excluded_users_list: Vec<DbId>,
    #[serde(default)]
    pub is_user_excluded: bool,
    #[serde(default)]
    pub is_super_admin_excluded: bool,
}

impl DeploymentWindowProfile {
    /// Write-time validation: field lengths, a resolvable zone, at least one
    /// window and every window well-formed for its frequency.
    pub fn validate_profile(&self) -> Result<(), CoreError> {
        self.validate()?;
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("Profile name must not be blank".to_string()));
        }
        if self.time_zone.trim().is_empty() {
            return Err(CoreError::Validation("timeZone is required".to_string()));
        }
        parse_time_zone(&self.time_zone)?;
        if self.windows.is_empty() {
            return Err(CoreError::Validation(
                "A profile requires at least one window".to_string(),
            ));
        }
        for (index, window) in self.windows.iter().enumerate() {
            window.validate().map_err(|e| match e {
                CoreError::Validation(msg) => CoreError::Validation(format!("windows[{index}]: {msg}")),
                other => other,
            })?;
        }
        Ok(())
    }

    /// The JSON blob stored in the policy row.
    pub fn to_policy(&self) -> DeploymentWindowPolicy {
        DeploymentWindowPolicy {
            time_zone: self.time_zone.clone(),
            display_message: self.display_message.clone(),
            excluded_users_list: self.excluded_users_list.clone(),
            is_super_admin_excluded: self.is_super_admin_excluded,
            is_user_excluded: self.is_user_excluded,
            window_type: Some(self.window_type),
        }
    }

    /// Rebuild a profile from a policy row and its windows.
    pub fn from_policy(
        id: DbId,
        name: String,
        description: String,
        enabled: bool,
        policy: DeploymentWindowPolicy,
        windows: Vec<TimeWindow>,
    ) -> Result<Self, CoreError> {
        let window_type = policy.window_type.ok_or_else(|| {
            CoreError::Validation(format!("Deployment window policy {id} has no type"))
        })?;
        Ok(Self {
            id,
            name,
            description,
            window_type,
            enabled,
            time_zone: policy.time_zone,
            display_message: policy.display_message,
            windows,
            excluded_users_list: policy.excluded_users_list,
            is_user_excluded: policy.is_user_excluded,
            is_super_admin_excluded: policy.is_super_admin_excluded,
        })
    }

    /// Users this profile lets through, ignoring super-admins.
    pub fn excluded_users(&self) -> &[DbId] {
        if self.is_user_excluded {
            self.excluded_users_list.as_slice()
        } else {
            &[]
        }
    }

    pub fn metadata(&self) -> DeploymentWindowProfileMetadata {
        DeploymentWindowProfileMetadata {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            window_type: self.window_type,
        }
    }
}

/// Policy-store blob of a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentWindowPolicy {
    pub time_zone: String,
    pub display_message: String,
    pub excluded_users_list: Vec<DbId>,
    pub is_super_admin_excluded: bool,
    pub is_user_excluded: bool,
    #[serde(rename = "type")]
    pub window_type: Option<DeploymentWindowType>,
}

impl DeploymentWindowPolicy {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        Self::deserialize(value)
            .map_err(|e| CoreError::Validation(format!("Malformed deployment window policy: {e}")))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Listing entry for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWindowProfileMetadata {
    pub id: DbId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub window_type: DeploymentWindowType,
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// One (app, env) pair a profile applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMapping {
    pub profile_id: DbId,
    pub app_id: DbId,
    pub env_id: DbId,
}

/// An (app, env) pair selected by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEnvSelector {
    pub app_id: DbId,
    pub env_id: DbId,
}
