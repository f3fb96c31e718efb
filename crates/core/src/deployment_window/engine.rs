//! Evaluation entry points over a consistent snapshot of the stores.
//!
//! A [`WindowSnapshot`] is loaded up-front by the persistence layer; every
//! function here is pure over it, so identical inputs give identical output
//! apart from `calculatedAt`.

use std::collections::HashMap;

use super::composer::{compose, sort_for_display, Horizon, ProfileEvaluator};
use super::profile::{AppEnvSelector, DeploymentWindowProfile, ProfileMapping};
use super::resolver::{
    bypass_message, combined_excluded_users, decorate_profile_exclusions, resolve_emails,
    user_action_state,
};
use super::state::{
    AppData, DeploymentWindowAppGroupResponse, DeploymentWindowOverview, DeploymentWindowResponse,
    EnvironmentState, ProfileOverview, TriggerDecision,
};
use crate::types::{DbId, Timestamp};

/// Everything one evaluation request reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    pub mappings: Vec<ProfileMapping>,
    pub profiles: HashMap<DbId, DeploymentWindowProfile>,
    pub super_admins: Vec<DbId>,
    /// User id to e-mail for every excluded user and super-admin.
    pub user_emails: HashMap<DbId, String>,
}

impl WindowSnapshot {
    /// Enabled profiles mapped to `(app_id, env_id)`, ordered by profile id.
    fn profiles_for(&self, app_id: DbId, env_id: DbId) -> Vec<&DeploymentWindowProfile> {
        let mut profiles: Vec<&DeploymentWindowProfile> = self
            .mappings
            .iter()
            .filter(|m| m.app_id == app_id && m.env_id == env_id)
            .filter_map(|m| self.profiles.get(&m.profile_id))
            .filter(|p| p.enabled)
            .collect();
        profiles.sort_by_key(|p| p.id);
        profiles.dedup_by_key(|p| p.id);
        profiles
    }

    /// Environments with at least one mapping for the app, ascending.
    pub fn mapped_envs(&self, app_id: DbId) -> Vec<DbId> {
        let mut envs: Vec<DbId> = self
            .mappings
            .iter()
            .filter(|m| m.app_id == app_id)
            .map(|m| m.env_id)
            .collect();
        envs.sort_unstable();
        envs.dedup();
        envs
    }

    fn requested_envs(&self, app_id: DbId, env_ids: &[DbId]) -> Vec<DbId> {
        if env_ids.is_empty() {
            return self.mapped_envs(app_id);
        }
        let mut envs = Vec::with_capacity(env_ids.len());
        for env_id in env_ids {
            if !envs.contains(env_id) {
                envs.push(*env_id);
            }
        }
        envs
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Mapped, enabled profiles per environment without time evaluation.
    /// Empty `env_ids` means every environment mapped for the app.
    pub fn overview(&self, app_id: DbId, env_ids: &[DbId]) -> DeploymentWindowOverview {
        let profiles = self
            .requested_envs(app_id, env_ids)
            .into_iter()
            .flat_map(|env_id| {
                self.profiles_for(app_id, env_id)
                    .into_iter()
                    .map(move |profile| ProfileOverview {
                        deployment_window_profile: profile.clone(),
                        env_id,
                    })
            })
            .collect();
        DeploymentWindowOverview { profiles }
    }

    /// Per-environment verdicts for one app and one user.
    pub fn profile_state(
        &self,
        target: Timestamp,
        app_id: DbId,
        env_ids: &[DbId],
        horizon: &Horizon,
        user_id: DbId,
    ) -> DeploymentWindowResponse {
        let mut evaluator = ProfileEvaluator::new(target);
        let envs = self.requested_envs(app_id, env_ids);
        self.app_state(&mut evaluator, app_id, &envs, horizon, user_id)
    }

    /// Verdicts for a batch of (app, env) pairs. Apps keep the order of
    /// their first appearance; each profile is evaluated once per batch.
    pub fn profile_state_app_group(
        &self,
        target: Timestamp,
        selectors: &[AppEnvSelector],
        horizon: &Horizon,
        user_id: DbId,
    ) -> DeploymentWindowAppGroupResponse {
        let mut grouped: Vec<(DbId, Vec<DbId>)> = Vec::new();
        for selector in selectors {
            match grouped.iter_mut().find(|(app_id, _)| *app_id == selector.app_id) {
                Some((_, envs)) => {
                    if !envs.contains(&selector.env_id) {
                        envs.push(selector.env_id);
                    }
                }
                None => grouped.push((selector.app_id, vec![selector.env_id])),
            }
        }

        let mut evaluator = ProfileEvaluator::new(target);
        let app_data = grouped
            .into_iter()
            .map(|(app_id, envs)| AppData {
                app_id,
                deployment_profile_list: self.app_state(&mut evaluator, app_id, &envs, horizon, user_id),
            })
            .collect();
        DeploymentWindowAppGroupResponse { app_data }
    }

    /// Whether `user_id` may trigger a deployment to `(app_id, env_id)` now.
    /// `horizon` must be the one a state query would use, so both agree.
    pub fn check_trigger(
        &self,
        target: Timestamp,
        app_id: DbId,
        env_id: DbId,
        horizon: &Horizon,
        user_id: DbId,
    ) -> TriggerDecision {
        let mut response = self.profile_state(target, app_id, &[env_id], horizon, user_id);
        let state = response
            .environment_state_map
            .remove(&env_id)
            .unwrap_or_else(|| EnvironmentState::unrestricted(target));

        TriggerDecision {
            allowed: state.user_action_state.permits_trigger(),
            user_action_state: state.user_action_state,
            message: bypass_message(state.user_action_state, state.applied_profile.as_ref()),
        }
    }

    // -----------------------------------------------------------------------
    // Composition per app
    // -----------------------------------------------------------------------

    fn app_state(
        &self,
        evaluator: &mut ProfileEvaluator,
        app_id: DbId,
        envs: &[DbId],
        horizon: &Horizon,
        user_id: DbId,
    ) -> DeploymentWindowResponse {
        let mut response = DeploymentWindowResponse::default();

        for &env_id in envs {
            let mut states: Vec<_> = self
                .profiles_for(app_id, env_id)
                .into_iter()
                .filter_map(|profile| evaluator.profile_state(profile, env_id, horizon))
                .collect();

            let composition = compose(&states);
            let excluded_users = combined_excluded_users(&states, &self.super_admins);
            let verdict = user_action_state(composition.allowed, user_id, &excluded_users);

            for state in &mut states {
                decorate_profile_exclusions(state, &self.super_admins, &self.user_emails);
            }
            let applied_profile = composition.applied_profile.map(|mut applied| {
                decorate_profile_exclusions(&mut applied, &self.super_admins, &self.user_emails);
                applied
            });

            tracing::debug!(
                app_id,
                env_id,
                user_id,
                state = %verdict,
                profiles = states.len(),
                "Evaluated deployment windows"
            );

            response.environment_state_map.insert(
                env_id,
                EnvironmentState {
                    user_action_state: verdict,
                    applied_profile,
                    excluded_user_emails: resolve_emails(&excluded_users, &self.user_emails),
                    excluded_users,
                    calculated_at: evaluator.target(),
                },
            );

            sort_for_display(&mut states);
            response.profiles.extend(states);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::deployment_window::profile::DeploymentWindowType;
    use crate::deployment_window::state::UserActionState;
    use crate::deployment_window::window::{HourMinute, TimeWindow};

    const APP: DbId = 1;
    const ENV: DbId = 10;

    fn hm(s: &str) -> HourMinute {
        s.parse().unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn profile(id: DbId, window_type: DeploymentWindowType, windows: Vec<TimeWindow>) -> DeploymentWindowProfile {
        DeploymentWindowProfile {
            id,
            name: format!("profile-{id}"),
            description: String::new(),
            window_type,
            enabled: true,
            time_zone: "UTC".to_string(),
            display_message: String::new(),
            windows,
            excluded_users_list: Vec::new(),
            is_user_excluded: false,
            is_super_admin_excluded: false,
        }
    }

    fn excluding(mut profile: DeploymentWindowProfile, users: Vec<DbId>) -> DeploymentWindowProfile {
        profile.is_user_excluded = true;
        profile.excluded_users_list = users;
        profile
    }

    fn snapshot(profiles: Vec<DeploymentWindowProfile>) -> WindowSnapshot {
        WindowSnapshot {
            mappings: profiles
                .iter()
                .map(|p| ProfileMapping {
                    profile_id: p.id,
                    app_id: APP,
                    env_id: ENV,
                })
                .collect(),
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            super_admins: Vec::new(),
            user_emails: HashMap::new(),
        }
    }

    fn env_state(snapshot: &WindowSnapshot, target: Timestamp, horizon: Horizon, user_id: DbId) -> EnvironmentState {
        snapshot
            .profile_state(target, APP, &[ENV], &horizon, user_id)
            .environment_state_map
            .remove(&ENV)
            .unwrap()
    }

    use DeploymentWindowType::{Blackout, Maintenance};

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn single_active_blackout_blocks_user() {
        let snap = snapshot(vec![profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))])]);
        let state = env_state(&snap, utc(2024, 6, 1, 11, 0), Horizon::unbounded(), 42);

        assert_eq!(state.user_action_state, UserActionState::Blocked);
        let applied = state.applied_profile.unwrap();
        assert_eq!(applied.profile_id(), 1);
        assert_eq!(applied.calculated_timestamp, utc(2024, 6, 1, 12, 0));
        assert!(state.excluded_user_emails.is_empty());
    }

    #[test]
    fn user_excluded_from_every_restriction_gets_partial() {
        let mut snap = snapshot(vec![
            excluding(profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]), vec![42]),
            excluding(profile(2, Maintenance, vec![TimeWindow::daily(hm("09:00"), hm("13:00"))]), vec![42, 7]),
        ]);
        snap.user_emails.insert(42, "dev@example.com".to_string());
        let state = env_state(&snap, utc(2024, 6, 1, 11, 0), Horizon::unbounded(), 42);

        assert_eq!(state.user_action_state, UserActionState::Partial);
        assert_eq!(state.applied_profile.unwrap().profile_id(), 1);
        assert_eq!(state.excluded_users, vec![42]);
        assert_eq!(state.excluded_user_emails, vec!["dev@example.com".to_string()]);
    }

    #[test]
    fn closed_maintenance_blocks_until_it_reopens() {
        let snap = snapshot(vec![profile(1, Maintenance, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))])]);
        let state = env_state(&snap, utc(2024, 6, 1, 14, 0), Horizon::unbounded(), 42);

        assert_eq!(state.user_action_state, UserActionState::Blocked);
        let applied = state.applied_profile.unwrap();
        assert_eq!(applied.profile_id(), 1);
        assert_eq!(applied.calculated_timestamp, utc(2024, 6, 2, 10, 0));
    }

    #[test]
    fn open_maintenance_allows_despite_upcoming_blackout() {
        let snap = snapshot(vec![
            profile(1, Maintenance, vec![TimeWindow::daily(hm("10:00"), hm("14:00"))]),
            profile(2, Blackout, vec![TimeWindow::daily(hm("12:00"), hm("13:00"))]),
        ]);
        let state = env_state(&snap, utc(2024, 6, 1, 11, 0), Horizon::unbounded(), 42);

        assert_eq!(state.user_action_state, UserActionState::Allowed);
        let applied = state.applied_profile.unwrap();
        assert_eq!(applied.profile_id(), 1);
        assert_eq!(applied.calculated_timestamp, utc(2024, 6, 1, 14, 0));
    }

    #[test]
    fn super_admin_exclusion() {
        let mut blackout = profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]);
        blackout.is_super_admin_excluded = true;
        let mut snap = snapshot(vec![blackout]);
        snap.super_admins = vec![99];
        let target = utc(2024, 6, 1, 11, 0);

        assert_eq!(env_state(&snap, target, Horizon::unbounded(), 99).user_action_state, UserActionState::Partial);
        assert_eq!(env_state(&snap, target, Horizon::unbounded(), 7).user_action_state, UserActionState::Blocked);
    }

    #[test]
    fn horizon_drops_far_future_maintenance() {
        let snap = snapshot(vec![profile(
            1,
            Maintenance,
            vec![TimeWindow::monthly(15, hm("00:00"), 15, hm("23:59"))],
        )]);
        let target = utc(2024, 6, 1, 0, 0);
        let response = snap.profile_state(target, APP, &[ENV], &Horizon::days(7), 42);

        assert!(response.profiles.is_empty());
        let state = &response.environment_state_map[&ENV];
        assert_eq!(state.user_action_state, UserActionState::Allowed);
        assert!(state.applied_profile.is_none());

        // Without the horizon the same maintenance gates deployments.
        let unbounded = env_state(&snap, target, Horizon::days(0), 42);
        assert_eq!(unbounded.user_action_state, UserActionState::Blocked);
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    #[test]
    fn unmapped_environment_is_allowed() {
        let snap = snapshot(vec![profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))])]);
        let target = utc(2024, 6, 1, 11, 0);
        let response = snap.profile_state(target, APP, &[ENV, 77], &Horizon::unbounded(), 42);

        let state = &response.environment_state_map[&77];
        assert_eq!(state.user_action_state, UserActionState::Allowed);
        assert!(state.applied_profile.is_none());
        assert_eq!(state.calculated_at, target);
    }

    #[test]
    fn applied_profile_carries_exactly_one_future_boundary() {
        let snap = snapshot(vec![profile(
            1,
            Blackout,
            vec![
                TimeWindow::daily(hm("10:00"), hm("12:00")),
                TimeWindow::weekly(vec![6], hm("00:00"), hm("23:00")),
                TimeWindow::fixed(utc(2024, 5, 1, 0, 0), utc(2024, 7, 1, 0, 0)),
            ],
        )]);
        let target = utc(2024, 6, 1, 11, 0);
        let applied = env_state(&snap, target, Horizon::unbounded(), 42).applied_profile.unwrap();

        assert_eq!(applied.deployment_window_profile.windows.len(), 1);
        assert!(applied.calculated_timestamp > target);
        assert_eq!(applied.calculated_timestamp, utc(2024, 7, 1, 0, 0));
    }

    #[test]
    fn excluded_users_come_from_profiles_or_super_admins() {
        let mut blackout = excluding(profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]), vec![3, 4]);
        blackout.is_super_admin_excluded = true;
        let mut snap = snapshot(vec![blackout]);
        snap.super_admins = vec![99];

        let state = env_state(&snap, utc(2024, 6, 1, 11, 0), Horizon::unbounded(), 42);
        assert_eq!(state.excluded_users, vec![3, 4, 99]);
    }

    #[test]
    fn trigger_check_matches_state() {
        let snap = snapshot(vec![
            excluding(profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]), vec![42]),
            profile(2, Maintenance, vec![TimeWindow::daily(hm("08:00"), hm("20:00"))]),
        ]);

        for hour in [9, 11, 13, 21] {
            let target = utc(2024, 6, 1, hour, 0);
            for user_id in [42, 7] {
                let state = env_state(&snap, target, Horizon::days(90), user_id);
                let decision = snap.check_trigger(target, APP, ENV, &Horizon::days(90), user_id);
                assert_eq!(decision.user_action_state, state.user_action_state);
                assert_eq!(
                    decision.allowed,
                    matches!(state.user_action_state, UserActionState::Allowed | UserActionState::Partial)
                );
            }
        }
    }

    #[test]
    fn trigger_check_hides_maintenance_beyond_the_horizon() {
        let target = utc(2024, 6, 1, 12, 0);
        let snap = snapshot(vec![profile(
            1,
            Maintenance,
            vec![TimeWindow::fixed(target + Duration::days(120), target + Duration::days(121))],
        )]);
        let horizon = Horizon::per_type(90, 90);

        let state = env_state(&snap, target, horizon, 7);
        let decision = snap.check_trigger(target, APP, ENV, &horizon, 7);
        assert_eq!(state.user_action_state, UserActionState::Allowed);
        assert_eq!(decision.user_action_state, UserActionState::Allowed);
        assert!(decision.allowed);

        let unbounded = snap.check_trigger(target, APP, ENV, &Horizon::unbounded(), 7);
        assert!(!unbounded.allowed);
        assert_eq!(unbounded.user_action_state, UserActionState::Blocked);
    }

    #[test]
    fn trigger_check_messages() {
        let mut blackout = profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]);
        blackout.name = "release freeze".to_string();
        let snap = snapshot(vec![blackout]);

        let blocked = snap.check_trigger(utc(2024, 6, 1, 11, 0), APP, ENV, &Horizon::unbounded(), 42);
        assert!(!blocked.allowed);
        assert_eq!(blocked.message, "Initiated during blackout window release freeze");

        let allowed = snap.check_trigger(utc(2024, 6, 1, 13, 0), APP, ENV, &Horizon::unbounded(), 42);
        assert!(allowed.allowed);
        assert_eq!(allowed.user_action_state, UserActionState::Allowed);
        assert!(allowed.message.is_empty());
    }

    // -----------------------------------------------------------------------
    // Laws
    // -----------------------------------------------------------------------

    #[test]
    fn evaluation_is_idempotent() {
        let snap = snapshot(vec![
            profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]),
            profile(2, Maintenance, vec![TimeWindow::weekly(vec![1, 2, 3], hm("09:00"), hm("17:00"))]),
        ]);
        let target = utc(2024, 6, 4, 11, 0);
        let first = snap.profile_state(target, APP, &[], &Horizon::days(90), 42);
        let second = snap.profile_state(target, APP, &[], &Horizon::days(90), 42);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn fixed_window_verdict_is_zone_invariant() {
        let window = TimeWindow::fixed(utc(2024, 6, 1, 10, 0), utc(2024, 6, 1, 12, 0));
        let in_utc = snapshot(vec![profile(1, Blackout, vec![window.clone()])]);
        let mut kolkata = profile(1, Blackout, vec![window]);
        kolkata.time_zone = "Asia/Kolkata".to_string();
        let in_kolkata = snapshot(vec![kolkata]);

        for minutes in [0, 30, 60, 119, 120, 180] {
            let target = utc(2024, 6, 1, 10, 0) + Duration::minutes(minutes);
            assert_eq!(
                env_state(&in_utc, target, Horizon::unbounded(), 42).user_action_state,
                env_state(&in_kolkata, target, Horizon::unbounded(), 42).user_action_state,
            );
        }
    }

    #[test]
    fn disabled_profile_is_invisible() {
        let blackout = profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]);
        let maintenance = profile(2, Maintenance, vec![TimeWindow::daily(hm("09:00"), hm("17:00"))]);
        let mut disabled = blackout.clone();
        disabled.enabled = false;

        let with_disabled = snapshot(vec![disabled, maintenance.clone()]);
        let without = snapshot(vec![maintenance]);
        let target = utc(2024, 6, 1, 11, 0);

        assert_eq!(
            with_disabled.profile_state(target, APP, &[ENV], &Horizon::unbounded(), 42),
            without.profile_state(target, APP, &[ENV], &Horizon::unbounded(), 42),
        );
        assert!(with_disabled.overview(APP, &[]).profiles.iter().all(|p| p.deployment_window_profile.id == 2));
    }

    // -----------------------------------------------------------------------
    // Overview and batch
    // -----------------------------------------------------------------------

    #[test]
    fn overview_defaults_to_all_mapped_envs() {
        let mut snap = snapshot(vec![
            profile(2, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]),
            profile(1, Maintenance, vec![TimeWindow::daily(hm("09:00"), hm("17:00"))]),
        ]);
        snap.mappings.push(ProfileMapping {
            profile_id: 1,
            app_id: APP,
            env_id: 20,
        });

        let overview = snap.overview(APP, &[]);
        let pairs: Vec<(DbId, DbId)> = overview
            .profiles
            .iter()
            .map(|p| (p.env_id, p.deployment_window_profile.id))
            .collect();
        assert_eq!(pairs, vec![(10, 1), (10, 2), (20, 1)]);

        assert_eq!(snap.overview(APP, &[20]).profiles.len(), 1);
        assert!(snap.overview(2, &[]).profiles.is_empty());
    }

    #[test]
    fn app_group_keeps_first_appearance_order() {
        let mut snap = snapshot(vec![profile(1, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))])]);
        snap.mappings.push(ProfileMapping {
            profile_id: 1,
            app_id: 5,
            env_id: ENV,
        });
        let selectors = [
            AppEnvSelector { app_id: 5, env_id: ENV },
            AppEnvSelector { app_id: APP, env_id: ENV },
            AppEnvSelector { app_id: 5, env_id: 30 },
        ];
        let target = utc(2024, 6, 1, 11, 0);
        let group = snap.profile_state_app_group(target, &selectors, &Horizon::unbounded(), 42);

        let apps: Vec<DbId> = group.app_data.iter().map(|a| a.app_id).collect();
        assert_eq!(apps, vec![5, APP]);

        let first = &group.app_data[0].deployment_profile_list;
        assert_eq!(first.environment_state_map[&ENV].user_action_state, UserActionState::Blocked);
        assert_eq!(first.environment_state_map[&30].user_action_state, UserActionState::Allowed);
        assert_eq!(
            group.app_data[1].deployment_profile_list.environment_state_map[&ENV].user_action_state,
            UserActionState::Blocked
        );
    }

    #[test]
    fn profiles_listed_active_first() {
        let snap = snapshot(vec![
            profile(1, Blackout, vec![TimeWindow::daily(hm("20:00"), hm("21:00"))]),
            profile(2, Maintenance, vec![TimeWindow::daily(hm("09:00"), hm("17:00"))]),
            profile(3, Blackout, vec![TimeWindow::daily(hm("10:00"), hm("12:00"))]),
        ]);
        let response = snap.profile_state(utc(2024, 6, 1, 11, 0), APP, &[ENV], &Horizon::unbounded(), 42);
        let order: Vec<DbId> = response.profiles.iter().map(|p| p.profile_id()).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(response.profiles.iter().all(|p| p.env_id == ENV));
    }
}
