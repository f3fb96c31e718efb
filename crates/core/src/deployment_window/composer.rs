//! Reduce the profiles covering one environment to a single verdict.
//!
//! Evaluation runs per profile (memoized by profile id), then the composer
//! combines blackout and maintenance profiles:
//!
//! - blackouts restrict only when every surviving blackout is active;
//! - maintenances permit when at least one is active, and do not gate at all
//!   when none are mapped.
//!
//! The applied profile is the one whose boundary best explains the verdict.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Duration;

use super::profile::{DeploymentWindowProfile, DeploymentWindowType};
use super::selector::select_window;
use super::state::ProfileState;
use super::time_range::parse_time_zone;
use super::window::TimeWindow;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Horizon filter
// ---------------------------------------------------------------------------

/// Hides inactive profiles whose next occurrence is too far in the future.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Horizon {
    pub blackout: Option<Duration>,
    pub maintenance: Option<Duration>,
}

impl Horizon {
    /// No profile is ever hidden.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// The same day-limit for both profile types. `days <= 0` disables it.
    pub fn days(days: i64) -> Self {
        Self::per_type(days, days)
    }

    /// Separate day-limits per profile type. Non-positive values disable the
    /// limit for that type, as do values too large for a `Duration`.
    pub fn per_type(blackout_days: i64, maintenance_days: i64) -> Self {
        let limit = |days: i64| if days > 0 { Duration::try_days(days) } else { None };
        Self {
            blackout: limit(blackout_days),
            maintenance: limit(maintenance_days),
        }
    }

    fn limit_for(&self, window_type: DeploymentWindowType) -> Option<Duration> {
        match window_type {
            DeploymentWindowType::Blackout => self.blackout,
            DeploymentWindowType::Maintenance => self.maintenance,
        }
    }

    /// Whether an evaluated profile falls beyond the horizon.
    pub fn hides(&self, window_type: DeploymentWindowType, evaluation: &ProfileEvaluation, target: Timestamp) -> bool {
        if evaluation.is_active {
            return false;
        }
        self.limit_for(window_type)
            .is_some_and(|limit| evaluation.calculated_timestamp - target > limit)
    }
}

// ---------------------------------------------------------------------------
// Per-profile evaluation
// ---------------------------------------------------------------------------

/// Evaluation of one profile at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEvaluation {
    pub is_active: bool,
    pub calculated_timestamp: Timestamp,
    pub window: TimeWindow,
}

/// Evaluate a profile's windows in its own zone.
///
/// Returns `None` when the profile should be dropped: disabled, an unknown
/// zone, or no window with an occurrence at or after `target`.
pub fn evaluate_profile(profile: &DeploymentWindowProfile, target: Timestamp) -> Option<ProfileEvaluation> {
    if !profile.enabled {
        return None;
    }
    let zone = match parse_time_zone(&profile.time_zone) {
        Ok(zone) => zone,
        Err(e) => {
            tracing::warn!(profile_id = profile.id, error = %e, "Dropping profile with unknown time zone");
            return None;
        }
    };
    let selection = select_window(&profile.windows, target, zone)?;
    Some(ProfileEvaluation {
        is_active: selection.is_active,
        calculated_timestamp: selection.boundary,
        window: selection.window.clone(),
    })
}

/// Memoizes profile evaluations for the lifetime of one request.
#[derive(Debug)]
pub struct ProfileEvaluator {
    target: Timestamp,
    cache: HashMap<DbId, Option<ProfileEvaluation>>,
}

impl ProfileEvaluator {
    pub fn new(target: Timestamp) -> Self {
        Self {
            target,
            cache: HashMap::new(),
        }
    }

    pub fn target(&self) -> Timestamp {
        self.target
    }

    pub fn evaluate(&mut self, profile: &DeploymentWindowProfile) -> Option<&ProfileEvaluation> {
        let target = self.target;
        self.cache
            .entry(profile.id)
            .or_insert_with(|| evaluate_profile(profile, target))
            .as_ref()
    }

    /// Evaluate and decorate a profile for one environment, honouring the
    /// horizon. `None` means the profile does not take part.
    pub fn profile_state(
        &mut self,
        profile: &DeploymentWindowProfile,
        env_id: DbId,
        horizon: &Horizon,
    ) -> Option<ProfileState> {
        let target = self.target;
        let evaluation = self.evaluate(profile)?;
        if horizon.hides(profile.window_type, evaluation, target) {
            return None;
        }

        let mut decorated = profile.clone();
        decorated.windows = vec![evaluation.window.clone()];
        Some(ProfileState {
            deployment_window_profile: decorated,
            env_id,
            is_active: evaluation.is_active,
            calculated_timestamp: evaluation.calculated_timestamp,
            excluded_user_emails: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Verdict of one environment before user exclusions are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub allowed: bool,
    pub is_blackout_active: bool,
    pub is_maintenance_active: bool,
    pub applied_profile: Option<ProfileState>,
}

/// Combine the evaluated profiles of one environment.
pub fn compose(profiles: &[ProfileState]) -> Composition {
    let (blackouts, maintenances): (Vec<&ProfileState>, Vec<&ProfileState>) = profiles
        .iter()
        .partition(|p| p.window_type() == DeploymentWindowType::Blackout);

    if blackouts.is_empty() && maintenances.is_empty() {
        return Composition {
            allowed: true,
            is_blackout_active: false,
            is_maintenance_active: false,
            applied_profile: None,
        };
    }

    let is_blackout_active = !blackouts.is_empty() && blackouts.iter().all(|p| p.is_active);
    let is_maintenance_active = maintenances.iter().any(|p| p.is_active);
    let maintenance_open = maintenances.is_empty() || is_maintenance_active;
    let allowed = !is_blackout_active && maintenance_open;

    let restricted = |p: &&&ProfileState| p.is_restricted();
    let unrestricted = |p: &&&ProfileState| !p.is_restricted();

    let applied = match (is_blackout_active, maintenance_open) {
        (true, true) => latest_ending(blackouts.iter().filter(restricted)),
        (false, false) => earliest_starting(maintenances.iter().filter(restricted)),
        (true, false) => latest_ending(blackouts.iter().chain(maintenances.iter()).filter(restricted)),
        (false, true) => latest_ending(maintenances.iter().filter(unrestricted))
            .or_else(|| earliest_starting(blackouts.iter().filter(unrestricted))),
    };

    Composition {
        allowed,
        is_blackout_active,
        is_maintenance_active,
        applied_profile: applied.cloned(),
    }
}

/// Latest `calculated_timestamp`; ties go to the lowest profile id.
fn latest_ending<'a, I>(profiles: I) -> Option<&'a ProfileState>
where
    I: Iterator<Item = &'a &'a ProfileState>,
{
    profiles
        .copied()
        .max_by(|a, b| by_timestamp(a, b).then_with(|| b.profile_id().cmp(&a.profile_id())))
}

/// Earliest `calculated_timestamp`; ties go to the lowest profile id.
fn earliest_starting<'a, I>(profiles: I) -> Option<&'a ProfileState>
where
    I: Iterator<Item = &'a &'a ProfileState>,
{
    profiles
        .copied()
        .min_by(|a, b| by_timestamp(a, b).then_with(|| a.profile_id().cmp(&b.profile_id())))
}

fn by_timestamp(a: &ProfileState, b: &ProfileState) -> Ordering {
    a.calculated_timestamp.cmp(&b.calculated_timestamp)
}

/// Active profiles first, then by profile id.
pub fn sort_for_display(profiles: &mut [ProfileState]) {
    profiles.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then_with(|| a.profile_id().cmp(&b.profile_id()))
    });
}
