//! Shared query parameter types for the deployment window endpoints.

use serde::Deserialize;
use windowgate_core::types::{DbId, Timestamp};

use crate::error::AppError;

/// `?appId=&envIds=` for the overview.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewParams {
    pub app_id: DbId,
    pub env_ids: Option<String>,
}

/// `?appId=&envIds=&days=&at=` for a state query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateParams {
    pub app_id: DbId,
    pub env_ids: Option<String>,
    /// Horizon in days; falls back to the configured fetch days.
    pub days: Option<i64>,
    /// Evaluation instant (RFC 3339); defaults to now.
    pub at: Option<Timestamp>,
}

/// `?appId=&envId=&at=` for a trigger check.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerParams {
    pub app_id: DbId,
    pub env_id: DbId,
    pub at: Option<Timestamp>,
}

/// Largest accepted `days` value (about a century).
pub const MAX_HORIZON_DAYS: i64 = 36_500;

/// Reject a `days` value above [`MAX_HORIZON_DAYS`]. Zero or less is kept
/// and disables the horizon.
pub fn check_days(days: Option<i64>) -> Result<Option<i64>, AppError> {
    match days {
        Some(d) if d > MAX_HORIZON_DAYS => Err(AppError::BadRequest(format!(
            "days must be at most {MAX_HORIZON_DAYS}, got {d}"
        ))),
        other => Ok(other),
    }
}

/// Parse a comma-separated id list. Blank entries are skipped, so an absent
/// or empty parameter yields an empty list.
pub fn parse_id_list(raw: Option<&str>) -> Result<Vec<DbId>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<DbId>()
                .map_err(|_| AppError::BadRequest(format!("Invalid id in envIds: '{s}'")))
        })
        .collect()
}
