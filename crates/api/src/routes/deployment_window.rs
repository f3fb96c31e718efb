//! Route definitions for deployment window profiles.
//!
//! ```text
//! /profiles                        list (GET), create (POST)
//! /profiles/{id}                   get (GET), update (PUT), delete (DELETE)
//! /profiles/{id}/mappings          replace mappings (PUT)
//! /profiles/by-name/{name}         get (GET), delete (DELETE)
//! /overview                        overview (GET)
//! /state                           state (GET)
//! /state/app-group                 batch state (POST)
//! /trigger-check                   trigger check (GET)
//! ```

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::deployment_window;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/profiles",
            get(deployment_window::list_profiles).post(deployment_window::create_profile),
        )
        .route(
            "/profiles/{id}",
            get(deployment_window::get_profile)
                .put(deployment_window::update_profile)
                .delete(deployment_window::delete_profile),
        )
        .route("/profiles/{id}/mappings", put(deployment_window::replace_mappings))
        .route(
            "/profiles/by-name/{name}",
            get(deployment_window::get_profile_by_name).delete(deployment_window::delete_profile_by_name),
        )
        .route("/overview", get(deployment_window::get_overview))
        .route("/state", get(deployment_window::get_state))
        .route("/state/app-group", post(deployment_window::get_state_app_group))
        .route("/trigger-check", get(deployment_window::check_trigger))
}
