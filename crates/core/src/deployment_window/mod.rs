//! Deployment window profiles and their evaluation.
//!
//! Layers, bottom-up:
//!
//! - [`window`]: the recurring time-window model and its persisted encoding.
//! - [`time_range`]: whether one window is active at an instant, and its
//!   next boundary.
//! - [`selector`]: the single window that dominates a profile.
//! - [`composer`]: blackout/maintenance composition per environment.
//! - [`resolver`]: per-user verdicts and exclusion lists.
//! - [`engine`]: request entry points over a [`WindowSnapshot`].

pub mod composer;
pub mod engine;
pub mod profile;
pub mod resolver;
pub mod selector;
pub mod state;
pub mod time_range;
pub mod window;

pub use composer::Horizon;
pub use engine::WindowSnapshot;
pub use profile::{
    AppEnvSelector, DeploymentWindowPolicy, DeploymentWindowProfile, DeploymentWindowProfileMetadata,
    DeploymentWindowType, ProfileMapping, GLOBAL_POLICY_TYPE_DEPLOYMENT_WINDOW,
    RESOURCE_TYPE_DEPLOYMENT_WINDOW_PROFILE,
};
pub use state::{
    AppData, DeploymentWindowAppGroupResponse, DeploymentWindowOverview, DeploymentWindowResponse,
    EnvironmentState, ProfileOverview, ProfileState, TriggerDecision, UserActionState,
};
pub use window::{Frequency, HourMinute, TimeWindow, EXPRESSION_FORMAT_RECURRING_TIME_RANGE};
