pub mod deployment_window;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /deployment-windows/profiles                        list (GET), create (POST)
/// /deployment-windows/profiles/{id}                   get (GET), update (PUT), delete (DELETE)
/// /deployment-windows/profiles/{id}/mappings          replace app/env mappings (PUT)
/// /deployment-windows/profiles/by-name/{name}         get (GET), delete (DELETE)
///
/// /deployment-windows/overview                        profiles per environment (GET)
/// /deployment-windows/state                           per-environment verdicts (GET)
/// /deployment-windows/state/app-group                 batch verdicts (POST)
/// /deployment-windows/trigger-check                   may the caller deploy now (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/deployment-windows", deployment_window::router())
}
