//! Turn a composed verdict into a per-user action state.

use std::collections::{BTreeSet, HashMap};

use super::profile::{DeploymentWindowProfile, DeploymentWindowType};
use super::state::{ProfileState, UserActionState};
use crate::types::DbId;

/// Users allowed through every restriction currently in force.
///
/// Only restricted profiles take part. The result is the intersection of
/// their exclusion lists, plus the super-admins when every restricted profile
/// excludes super-admins. No restricted profile means nobody is excluded.
pub fn combined_excluded_users(profiles: &[ProfileState], super_admins: &[DbId]) -> Vec<DbId> {
    let mut restricted = profiles.iter().filter(|p| p.is_restricted()).peekable();
    if restricted.peek().is_none() {
        return Vec::new();
    }

    let mut combined: Option<BTreeSet<DbId>> = None;
    let mut super_admins_excluded = true;
    for state in restricted {
        let profile = &state.deployment_window_profile;
        let users: BTreeSet<DbId> = profile.excluded_users().iter().copied().collect();
        combined = Some(match combined {
            Some(acc) => acc.intersection(&users).copied().collect(),
            None => users,
        });
        super_admins_excluded &= profile.is_super_admin_excluded;
    }

    let mut combined = combined.unwrap_or_default();
    if super_admins_excluded {
        combined.extend(super_admins.iter().copied());
    }
    combined.into_iter().collect()
}

pub fn user_action_state(allowed: bool, user_id: DbId, excluded_users: &[DbId]) -> UserActionState {
    if allowed {
        UserActionState::Allowed
    } else if excluded_users.contains(&user_id) {
        UserActionState::Partial
    } else {
        UserActionState::Blocked
    }
}

/// Resolve user ids to e-mail addresses. Unknown users and addresses without
/// an `@` are left out.
pub fn resolve_emails(user_ids: &[DbId], user_emails: &HashMap<DbId, String>) -> Vec<String> {
    user_ids
        .iter()
        .filter_map(|id| match user_emails.get(id) {
            Some(email) if email.contains('@') => Some(email.clone()),
            Some(_) => None,
            None => {
                tracing::debug!(user_id = id, "Excluded user has no e-mail in the directory");
                None
            }
        })
        .collect()
}

/// Users a single profile lets through, super-admins included when flagged.
pub fn effective_excluded_users(profile: &DeploymentWindowProfile, super_admins: &[DbId]) -> Vec<DbId> {
    let mut users: BTreeSet<DbId> = profile.excluded_users().iter().copied().collect();
    if profile.is_super_admin_excluded {
        users.extend(super_admins.iter().copied());
    }
    users.into_iter().collect()
}

/// Fill a profile state's e-mail list from its own exclusion policy.
pub fn decorate_profile_exclusions(
    state: &mut ProfileState,
    super_admins: &[DbId],
    user_emails: &HashMap<DbId, String>,
) {
    let users = effective_excluded_users(&state.deployment_window_profile, super_admins);
    state.excluded_user_emails = resolve_emails(&users, user_emails);
}

/// Message attached to a deployment that runs under a restriction.
pub fn bypass_message(state: UserActionState, applied: Option<&ProfileState>) -> String {
    if state == UserActionState::Allowed {
        return String::new();
    }
    match applied.map(|p| (p.window_type(), &p.deployment_window_profile.name)) {
        Some((DeploymentWindowType::Blackout, name)) => format!("Initiated during blackout window {name}"),
        Some((DeploymentWindowType::Maintenance, _)) => "Initiated outside maintenance window".to_string(),
        None => String::new(),
    }
}
