//! Deployment window profiles on top of the policy, window, mapping and user
//! stores.
//!
//! Writes change the policy row and its window rows in one transaction.
//! Evaluation reads go through [`DeploymentWindowRepo::load_snapshot`], which
//! performs every read inside a single `REPEATABLE READ` transaction.

use std::collections::{BTreeSet, HashMap};

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use windowgate_core::deployment_window::{
    AppEnvSelector, DeploymentWindowPolicy, DeploymentWindowProfile,
    DeploymentWindowProfileMetadata, ProfileMapping, TimeWindow, WindowSnapshot,
    GLOBAL_POLICY_TYPE_DEPLOYMENT_WINDOW, RESOURCE_TYPE_DEPLOYMENT_WINDOW_PROFILE,
};
use windowgate_core::error::CoreError;
use windowgate_core::types::DbId;

use super::{PolicyRepo, ResourceMappingRepo, TimeWindowRepo, UserDirectoryRepo};
use crate::error::DbError;
use crate::models::global_policy::{CreateGlobalPolicy, GlobalPolicy, UpdateGlobalPolicy};
use crate::models::resource_mapping::ResourceQualifierMapping;
use crate::models::time_window::TimeoutWindowMapping;

const POLICY_OF: &str = GLOBAL_POLICY_TYPE_DEPLOYMENT_WINDOW;
const RESOURCE_TYPE: &str = RESOURCE_TYPE_DEPLOYMENT_WINDOW_PROFILE;
const ENTITY: &str = "DeploymentWindowProfile";

pub struct DeploymentWindowRepo;

impl DeploymentWindowRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Validate and insert a profile with its windows, returning it with the
    /// assigned id.
    pub async fn create(
        pool: &PgPool,
        profile: &DeploymentWindowProfile,
        user_id: DbId,
    ) -> Result<DeploymentWindowProfile, DbError> {
        profile.validate_profile()?;

        let mut tx = pool.begin().await?;
        let row = PolicyRepo::create(
            &mut *tx,
            &CreateGlobalPolicy {
                name: profile.name.clone(),
                description: profile.description.clone(),
                policy_of: POLICY_OF.to_string(),
                enabled: profile.enabled,
                json_data: profile.to_policy().to_json(),
                created_by: user_id,
            },
        )
        .await?;
        TimeWindowRepo::replace_for_resource(&mut *tx, RESOURCE_TYPE, row.id, &profile.windows, user_id)
            .await?;
        tx.commit().await?;

        tracing::info!(profile_id = row.id, name = %row.name, user_id, "Deployment window profile created");

        let mut created = profile.clone();
        created.id = row.id;
        Ok(created)
    }

    /// Validate and fully replace a profile and its windows.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        profile: &DeploymentWindowProfile,
        user_id: DbId,
    ) -> Result<DeploymentWindowProfile, DbError> {
        if profile.id != 0 && profile.id != id {
            return Err(CoreError::Validation(format!(
                "Profile id {} does not match path id {id}",
                profile.id
            ))
            .into());
        }
        profile.validate_profile()?;

        let mut tx = pool.begin().await?;
        PolicyRepo::update(
            &mut *tx,
            id,
            POLICY_OF,
            &UpdateGlobalPolicy {
                name: profile.name.clone(),
                description: profile.description.clone(),
                enabled: profile.enabled,
                json_data: profile.to_policy().to_json(),
                updated_by: user_id,
            },
        )
        .await?
        .ok_or(CoreError::NotFound { entity: ENTITY, id })?;
        TimeWindowRepo::replace_for_resource(&mut *tx, RESOURCE_TYPE, id, &profile.windows, user_id).await?;
        tx.commit().await?;

        tracing::info!(profile_id = id, user_id, "Deployment window profile updated");

        let mut updated = profile.clone();
        updated.id = id;
        Ok(updated)
    }

    /// Soft-delete a profile, drop its windows and deactivate its mappings.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: DbId) -> Result<(), DbError> {
        let mut tx = pool.begin().await?;
        if !Self::delete_inner(&mut tx, id, user_id).await? {
            return Err(CoreError::NotFound { entity: ENTITY, id }.into());
        }
        tx.commit().await?;

        tracing::info!(profile_id = id, user_id, "Deployment window profile deleted");
        Ok(())
    }

    /// Delete a profile by name, returning the id it had.
    pub async fn delete_by_name(pool: &PgPool, name: &str, user_id: DbId) -> Result<DbId, DbError> {
        let mut tx = pool.begin().await?;
        let policy = PolicyRepo::find_by_name(&mut *tx, name, POLICY_OF)
            .await?
            .ok_or_else(|| CoreError::NotFoundByName {
                entity: ENTITY,
                name: name.to_string(),
            })?;
        Self::delete_inner(&mut tx, policy.id, user_id).await?;
        tx.commit().await?;

        tracing::info!(profile_id = policy.id, name, user_id, "Deployment window profile deleted");
        Ok(policy.id)
    }

    async fn delete_inner(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        if !PolicyRepo::soft_delete(&mut **tx, id, POLICY_OF, user_id).await? {
            return Ok(false);
        }
        TimeWindowRepo::delete_for_resource(&mut **tx, RESOURCE_TYPE, id).await?;
        ResourceMappingRepo::delete_for_resource(&mut **tx, RESOURCE_TYPE, id).await?;
        Ok(true)
    }

    /// Make `selections` the exact set of (app, env) pairs the profile
    /// applies to, returning the resulting mappings.
    pub async fn replace_mappings(
        pool: &PgPool,
        profile_id: DbId,
        selections: &[AppEnvSelector],
        user_id: DbId,
    ) -> Result<Vec<ProfileMapping>, DbError> {
        let mut tx = pool.begin().await?;
        PolicyRepo::find_by_id(&mut *tx, profile_id, POLICY_OF)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY,
                id: profile_id,
            })?;
        ResourceMappingRepo::replace_for_resource(&mut *tx, RESOURCE_TYPE, profile_id, selections, user_id)
            .await?;
        let rows = ResourceMappingRepo::list_for_resource(&mut *tx, RESOURCE_TYPE, profile_id).await?;
        tx.commit().await?;

        tracing::info!(profile_id, mappings = rows.len(), user_id, "Deployment window mappings replaced");
        Ok(rows.iter().map(ResourceQualifierMapping::to_profile_mapping).collect())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Full profile with all its windows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DeploymentWindowProfile>, DbError> {
        let mut conn = pool.acquire().await?;
        match PolicyRepo::find_by_id(&mut conn, id, POLICY_OF).await? {
            Some(policy) => Ok(Some(Self::load_profile(&mut conn, policy).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<DeploymentWindowProfile>, DbError> {
        let mut conn = pool.acquire().await?;
        match PolicyRepo::find_by_name(&mut conn, name, POLICY_OF).await? {
            Some(policy) => Ok(Some(Self::load_profile(&mut conn, policy).await?)),
            None => Ok(None),
        }
    }

    /// Metadata of every live profile, ordered by id. Profiles whose policy
    /// blob cannot be decoded are skipped.
    pub async fn list(pool: &PgPool) -> Result<Vec<DeploymentWindowProfileMetadata>, DbError> {
        let mut conn = pool.acquire().await?;
        let policies = PolicyRepo::list_active_of_type(&mut conn, POLICY_OF).await?;
        Ok(policies
            .into_iter()
            .filter_map(|policy| {
                let id = policy.id;
                match assemble_profile(policy, Vec::new()) {
                    Ok(profile) => Some(profile.metadata()),
                    Err(e) => {
                        tracing::warn!(profile_id = id, error = %e, "Skipping undecodable deployment window policy");
                        None
                    }
                }
            })
            .collect())
    }

    async fn load_profile(
        conn: &mut PgConnection,
        policy: GlobalPolicy,
    ) -> Result<DeploymentWindowProfile, DbError> {
        let rows = TimeWindowRepo::list_for_resources(&mut *conn, RESOURCE_TYPE, &[policy.id]).await?;
        let windows = group_windows(rows).remove(&policy.id).unwrap_or_default();
        let id = policy.id;
        assemble_profile(policy, windows).map_err(|e| {
            tracing::error!(profile_id = id, error = %e, "Stored deployment window policy is undecodable");
            DbError::Core(CoreError::Internal(format!("Deployment window profile {id} is corrupt")))
        })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Everything needed to evaluate the given (app, env) pairs.
    pub async fn load_snapshot(pool: &PgPool, selections: &[AppEnvSelector]) -> Result<WindowSnapshot, sqlx::Error> {
        let mut tx = begin_snapshot(pool).await?;
        let rows = ResourceMappingRepo::list_for_selections(&mut *tx, RESOURCE_TYPE, selections).await?;
        let snapshot = snapshot_from_mappings(&mut *tx, rows).await?;
        // Read-only; nothing to commit.
        tx.rollback().await?;
        Ok(snapshot)
    }

    /// Everything needed to evaluate every mapped environment of the apps.
    pub async fn load_snapshot_for_apps(pool: &PgPool, app_ids: &[DbId]) -> Result<WindowSnapshot, sqlx::Error> {
        let mut tx = begin_snapshot(pool).await?;
        let rows = ResourceMappingRepo::list_for_apps(&mut *tx, RESOURCE_TYPE, app_ids).await?;
        let snapshot = snapshot_from_mappings(&mut *tx, rows).await?;
        tx.rollback().await?;
        Ok(snapshot)
    }
}

async fn begin_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

async fn snapshot_from_mappings(
    conn: &mut PgConnection,
    rows: Vec<ResourceQualifierMapping>,
) -> Result<WindowSnapshot, sqlx::Error> {
    let mappings: Vec<ProfileMapping> = rows.iter().map(ResourceQualifierMapping::to_profile_mapping).collect();
    let profile_ids: Vec<DbId> = mappings
        .iter()
        .map(|m| m.profile_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let policies = PolicyRepo::find_by_ids(&mut *conn, &profile_ids, POLICY_OF).await?;
    let window_rows = TimeWindowRepo::list_for_resources(&mut *conn, RESOURCE_TYPE, &profile_ids).await?;
    let mut windows = group_windows(window_rows);

    let profiles: HashMap<DbId, DeploymentWindowProfile> = policies
        .into_iter()
        .filter_map(|policy| {
            let id = policy.id;
            let profile_windows = windows.remove(&id).unwrap_or_default();
            match assemble_profile(policy, profile_windows) {
                Ok(profile) => Some((id, profile)),
                Err(e) => {
                    tracing::warn!(profile_id = id, error = %e, "Skipping undecodable deployment window policy");
                    None
                }
            }
        })
        .collect();

    let super_admins = UserDirectoryRepo::super_admin_ids(&mut *conn).await?;
    let user_ids: Vec<DbId> = profiles
        .values()
        .flat_map(|p| p.excluded_users().iter().copied())
        .chain(super_admins.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let user_emails = match UserDirectoryRepo::find_by_ids(&mut *conn, &user_ids).await {
        Ok(users) => users
            .into_iter()
            .filter(|u| u.email_id.contains('@'))
            .map(|u| (u.id, u.email_id))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "User directory lookup failed; excluded-user e-mails omitted");
            HashMap::new()
        }
    };

    Ok(WindowSnapshot {
        mappings,
        profiles,
        super_admins,
        user_emails,
    })
}

/// Decode window rows per resource, skipping rows that fail to parse.
fn group_windows(rows: Vec<TimeoutWindowMapping>) -> HashMap<DbId, Vec<TimeWindow>> {
    let mut grouped: HashMap<DbId, Vec<TimeWindow>> = HashMap::new();
    for row in rows {
        match TimeWindow::from_json(&row.window_expression) {
            Ok(window) => grouped.entry(row.resource_id).or_default().push(window),
            Err(e) => tracing::warn!(
                window_id = row.id,
                profile_id = row.resource_id,
                error = %e,
                "Skipping unparseable deployment window"
            ),
        }
    }
    grouped
}

fn assemble_profile(policy: GlobalPolicy, windows: Vec<TimeWindow>) -> Result<DeploymentWindowProfile, CoreError> {
    let blob = DeploymentWindowPolicy::from_json(&policy.json_data)?;
    DeploymentWindowProfile::from_policy(policy.id, policy.name, policy.description, policy.enabled, blob, windows)
}
