//! Request-scoped evaluation results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::profile::{DeploymentWindowProfile, DeploymentWindowType};
use crate::types::{DbId, Timestamp};

/// Verdict for one user on one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserActionState {
    /// No restriction is in force.
    Allowed,
    /// A restriction is in force and the user is not exempt.
    Blocked,
    /// A restriction is in force but the user is exempt from it.
    Partial,
}

impl UserActionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "ALLOWED",
            Self::Blocked => "BLOCKED",
            Self::Partial => "PARTIAL",
        }
    }

    /// Whether a deployment may proceed for this user.
    pub fn permits_trigger(&self) -> bool {
        matches!(self, Self::Allowed | Self::Partial)
    }
}

impl fmt::Display for UserActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A profile decorated with its evaluation at the query instant.
///
/// `deployment_window_profile.windows` holds only the window that
/// dominated the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    pub deployment_window_profile: DeploymentWindowProfile,
    pub env_id: DbId,
    pub is_active: bool,
    /// End of the active window, or start of the next one.
    pub calculated_timestamp: Timestamp,
    pub excluded_user_emails: Vec<String>,
}

impl ProfileState {
    pub fn profile_id(&self) -> DbId {
        self.deployment_window_profile.id
    }

    pub fn window_type(&self) -> DeploymentWindowType {
        self.deployment_window_profile.window_type
    }

    /// Whether this profile currently constrains deployments: an active
    /// blackout or an inactive maintenance.
    pub fn is_restricted(&self) -> bool {
        match self.window_type() {
            DeploymentWindowType::Blackout => self.is_active,
            DeploymentWindowType::Maintenance => !self.is_active,
        }
    }
}

/// Composed verdict for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentState {
    pub user_action_state: UserActionState,
    pub applied_profile: Option<ProfileState>,
    pub excluded_users: Vec<DbId>,
    pub excluded_user_emails: Vec<String>,
    pub calculated_at: Timestamp,
}

impl EnvironmentState {
    /// State of an environment no enabled profile covers.
    pub fn unrestricted(calculated_at: Timestamp) -> Self {
        Self {
            user_action_state: UserActionState::Allowed,
            applied_profile: None,
            excluded_users: Vec::new(),
            excluded_user_emails: Vec::new(),
            calculated_at,
        }
    }
}

/// GetState result for one app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWindowResponse {
    pub environment_state_map: BTreeMap<DbId, EnvironmentState>,
    pub profiles: Vec<ProfileState>,
}

/// One mapped, enabled profile without time evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverview {
    pub deployment_window_profile: DeploymentWindowProfile,
    pub env_id: DbId,
}

/// GetOverview result for one app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWindowOverview {
    pub profiles: Vec<ProfileOverview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub app_id: DbId,
    pub deployment_profile_list: DeploymentWindowResponse,
}

/// GetStateBatch result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWindowAppGroupResponse {
    pub app_data: Vec<AppData>,
}

/// CheckTriggerAllowed result with the message shown when a deployment is
/// blocked or bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDecision {
    pub allowed: bool,
    pub user_action_state: UserActionState,
    pub message: String,
}
