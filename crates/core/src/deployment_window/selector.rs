//! Pick the window that dominates a profile at an instant.

use chrono_tz::Tz;

use super::time_range;
use super::window::TimeWindow;
use crate::types::Timestamp;

/// The window chosen for a profile together with its evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSelection<'a> {
    pub is_active: bool,
    pub boundary: Timestamp,
    pub window: &'a TimeWindow,
}

/// Select the dominating window of a profile at `target`.
///
/// Among active windows the latest-ending one wins; otherwise the
/// earliest-starting upcoming window wins. Ties keep the first window in
/// input order. Malformed windows are logged and skipped. Returns `None` when
/// no window has an occurrence at or after `target`.
pub fn select_window(windows: &[TimeWindow], target: Timestamp, zone: Tz) -> Option<WindowSelection<'_>> {
    let mut active: Option<(Timestamp, &TimeWindow)> = None;
    let mut upcoming: Option<(Timestamp, &TimeWindow)> = None;

    for (index, window) in windows.iter().enumerate() {
        let evaluation = match time_range::evaluate(window, target, zone) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::warn!(
                    window_index = index,
                    frequency = %window.frequency,
                    error = %e,
                    "Skipping malformed deployment window"
                );
                continue;
            }
        };
        let Some(boundary) = evaluation.boundary else {
            continue;
        };

        if evaluation.is_active {
            if active.map_or(true, |(best, _)| boundary > best) {
                active = Some((boundary, window));
            }
        } else if upcoming.map_or(true, |(best, _)| boundary < best) {
            upcoming = Some((boundary, window));
        }
    }

    if let Some((boundary, window)) = active {
        return Some(WindowSelection {
            is_active: true,
            boundary,
            window,
        });
    }
    upcoming.map(|(boundary, window)| WindowSelection {
        is_active: false,
        boundary,
        window,
    })
}
