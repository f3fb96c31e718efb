//! Handlers for deployment window profiles and their evaluation.
//!
//! Profile management is admin-only. State queries accept any authenticated
//! user; the token subject is the user whose exclusions are evaluated.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use windowgate_core::deployment_window::{AppEnvSelector, DeploymentWindowProfile, WindowSnapshot};
use windowgate_core::error::CoreError;
use windowgate_core::types::{DbId, Timestamp};
use windowgate_db::repositories::DeploymentWindowRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::query::{check_days, parse_id_list, OverviewParams, StateParams, TriggerParams};
use crate::response::DataResponse;
use crate::state::AppState;

const ENTITY: &str = "DeploymentWindowProfile";

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /state/app-group`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppGroupStateRequest {
    pub selectors: Vec<AppEnvSelector>,
    pub days: Option<i64>,
    pub at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn instant(at: Option<Timestamp>) -> Timestamp {
    at.unwrap_or_else(chrono::Utc::now)
}

/// Load the snapshot covering `app_id`. With no explicit environments every
/// mapping of the app is needed.
async fn snapshot_for_app(state: &AppState, app_id: DbId, env_ids: &[DbId]) -> AppResult<WindowSnapshot> {
    let snapshot = if env_ids.is_empty() {
        DeploymentWindowRepo::load_snapshot_for_apps(&state.pool, &[app_id]).await?
    } else {
        let selections: Vec<AppEnvSelector> = env_ids
            .iter()
            .map(|&env_id| AppEnvSelector { app_id, env_id })
            .collect();
        DeploymentWindowRepo::load_snapshot(&state.pool, &selections).await?
    };
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Profile management
// ---------------------------------------------------------------------------

/// POST /api/v1/deployment-windows/profiles
pub async fn create_profile(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<DeploymentWindowProfile>,
) -> AppResult<impl IntoResponse> {
    let profile = DeploymentWindowRepo::create(&state.pool, &input, admin.user_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: profile })))
}

/// GET /api/v1/deployment-windows/profiles
pub async fn list_profiles(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let profiles = DeploymentWindowRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: profiles }))
}

/// GET /api/v1/deployment-windows/profiles/{id}
pub async fn get_profile(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let profile = DeploymentWindowRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: ENTITY, id }))?;
    Ok(Json(DataResponse { data: profile }))
}

/// PUT /api/v1/deployment-windows/profiles/{id}
pub async fn update_profile(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<DeploymentWindowProfile>,
) -> AppResult<impl IntoResponse> {
    let profile = DeploymentWindowRepo::update(&state.pool, id, &input, admin.user_id).await?;
    Ok(Json(DataResponse { data: profile }))
}

/// DELETE /api/v1/deployment-windows/profiles/{id}
pub async fn delete_profile(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    DeploymentWindowRepo::delete(&state.pool, id, admin.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/deployment-windows/profiles/by-name/{name}
pub async fn get_profile_by_name(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let profile = DeploymentWindowRepo::find_by_name(&state.pool, &name)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::NotFoundByName { entity: ENTITY, name }))?;
    Ok(Json(DataResponse { data: profile }))
}

/// DELETE /api/v1/deployment-windows/profiles/by-name/{name}
pub async fn delete_profile_by_name(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    DeploymentWindowRepo::delete_by_name(&state.pool, &name, admin.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/deployment-windows/profiles/{id}/mappings
pub async fn replace_mappings(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(selections): Json<Vec<AppEnvSelector>>,
) -> AppResult<impl IntoResponse> {
    let mappings = DeploymentWindowRepo::replace_mappings(&state.pool, id, &selections, admin.user_id).await?;
    Ok(Json(DataResponse { data: mappings }))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// GET /api/v1/deployment-windows/overview
pub async fn get_overview(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<OverviewParams>,
) -> AppResult<impl IntoResponse> {
    let env_ids = parse_id_list(params.env_ids.as_deref())?;
    let snapshot = snapshot_for_app(&state, params.app_id, &env_ids).await?;
    Ok(Json(DataResponse {
        data: snapshot.overview(params.app_id, &env_ids),
    }))
}

/// GET /api/v1/deployment-windows/state
pub async fn get_state(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<StateParams>,
) -> AppResult<impl IntoResponse> {
    let env_ids = parse_id_list(params.env_ids.as_deref())?;
    let horizon = state.config.deployment_window.horizon(check_days(params.days)?);
    let snapshot = snapshot_for_app(&state, params.app_id, &env_ids).await?;

    let response = snapshot.profile_state(instant(params.at), params.app_id, &env_ids, &horizon, user.user_id);
    tracing::debug!(
        app_id = params.app_id,
        environments = response.environment_state_map.len(),
        user_id = user.user_id,
        "Deployment window state evaluated",
    );
    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/deployment-windows/state/app-group
pub async fn get_state_app_group(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<AppGroupStateRequest>,
) -> AppResult<impl IntoResponse> {
    let horizon = state.config.deployment_window.horizon(check_days(input.days)?);
    let snapshot = DeploymentWindowRepo::load_snapshot(&state.pool, &input.selectors).await?;

    let response = snapshot.profile_state_app_group(instant(input.at), &input.selectors, &horizon, user.user_id);
    Ok(Json(DataResponse { data: response }))
}

/// GET /api/v1/deployment-windows/trigger-check
pub async fn check_trigger(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> AppResult<impl IntoResponse> {
    let horizon = state.config.deployment_window.horizon(None);
    let snapshot = snapshot_for_app(&state, params.app_id, &[params.env_id]).await?;
    let decision = snapshot.check_trigger(instant(params.at), params.app_id, params.env_id, &horizon, user.user_id);

    if !decision.allowed {
        tracing::info!(
            app_id = params.app_id,
            env_id = params.env_id,
            user_id = user.user_id,
            state = %decision.user_action_state,
            "Deployment trigger blocked by deployment window",
        );
    }
    Ok(Json(DataResponse { data: decision }))
}
