//! Recurring time-range arithmetic.
//!
//! [`evaluate`] decides whether an instant falls inside one [`TimeWindow`] and
//! returns the next boundary: the end of the current occurrence when inside,
//! the start of the next occurrence when outside. All wall-clock arithmetic
//! happens in the profile's zone, so DST transitions shift occurrences the
//! way a local calendar would.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::window::{Frequency, HourMinute, TimeWindow};
use crate::error::CoreError;
use crate::types::Timestamp;

/// Zone used when a profile carries an empty zone name.
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// Longest DST gap we walk across when resolving a skipped wall-clock time.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Result of evaluating one window at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvaluation {
    pub is_active: bool,
    /// End of the current occurrence when active, start of the next one
    /// otherwise. `None` when the window never occurs again.
    pub boundary: Option<Timestamp>,
}

/// A concrete `[start, end)` occurrence of a recurring window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurrence {
    start: Timestamp,
    end: Timestamp,
}

/// Resolve an IANA zone name. An empty name means UTC.
pub fn parse_time_zone(name: &str) -> Result<Tz, CoreError> {
    let name = if name.trim().is_empty() {
        DEFAULT_TIME_ZONE
    } else {
        name.trim()
    };
    name.parse::<Tz>()
        .map_err(|e| CoreError::Validation(format!("Unknown time zone '{name}': {e}")))
}

/// Evaluate `window` at `target` using the calendar of `zone`.
pub fn evaluate(window: &TimeWindow, target: Timestamp, zone: Tz) -> Result<WindowEvaluation, CoreError> {
    if window.frequency == Frequency::Fixed {
        let (from, to) = window.fixed_range()?;
        return Ok(evaluate_fixed(from, to, target));
    }

    let occurrences = occurrences_around(window, target, zone)?;

    let active_end = occurrences
        .iter()
        .filter(|o| o.start <= target && target < o.end)
        .map(|o| o.end)
        .max();
    if let Some(end) = active_end {
        return Ok(WindowEvaluation {
            is_active: true,
            boundary: Some(end),
        });
    }

    let next_start = occurrences
        .iter()
        .filter(|o| o.start > target)
        .map(|o| o.start)
        .min();
    Ok(WindowEvaluation {
        is_active: false,
        boundary: next_start,
    })
}

fn evaluate_fixed(from: Timestamp, to: Timestamp, target: Timestamp) -> WindowEvaluation {
    if from <= target && target < to {
        WindowEvaluation {
            is_active: true,
            boundary: Some(to),
        }
    } else if target < from {
        WindowEvaluation {
            is_active: false,
            boundary: Some(from),
        }
    } else {
        WindowEvaluation {
            is_active: false,
            boundary: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Occurrence generation
// ---------------------------------------------------------------------------

/// Generate every occurrence that can contain `target` or be the next one
/// after it. The scan ranges are wide enough that the longest possible
/// occurrence of each frequency is covered on both sides.
fn occurrences_around(window: &TimeWindow, target: Timestamp, zone: Tz) -> Result<Vec<Occurrence>, CoreError> {
    let (from, to) = window.clock_range()?;
    let today = target.with_timezone(&zone).date_naive();
    let mut occurrences = Vec::new();

    match window.frequency {
        Frequency::Fixed => {}
        Frequency::Daily => {
            for offset in -2..=2 {
                let day = today + Duration::days(offset);
                let end_day = if from < to { day } else { day + Duration::days(1) };
                push_span(&mut occurrences, zone, day, from, end_day, to)?;
            }
        }
        Frequency::Weekly => {
            let weekdays = window.weekday_set()?;
            for offset in -8..=8 {
                let day = today + Duration::days(offset);
                if !weekdays.contains(&day.weekday()) {
                    continue;
                }
                let end_day = if from < to { day } else { day + Duration::days(1) };
                push_span(&mut occurrences, zone, day, from, end_day, to)?;
            }
        }
        Frequency::WeeklyRange => {
            let (weekday_from, weekday_to) = window.weekday_span()?;
            let mut span_days = (i64::from(weekday_to.num_days_from_sunday())
                - i64::from(weekday_from.num_days_from_sunday()))
            .rem_euclid(7);
            if span_days == 0 && to <= from {
                span_days = 7;
            }
            for offset in -15..=8 {
                let day = today + Duration::days(offset);
                if day.weekday() != weekday_from {
                    continue;
                }
                push_span(&mut occurrences, zone, day, from, day + Duration::days(span_days), to)?;
            }
        }
        Frequency::Monthly => {
            let (day_from, day_to) = window.day_span()?;
            let wraps = day_to < day_from || (day_to == day_from && to <= from);
            for offset in -2..=2 {
                let (year, month) = shift_month(today.year(), today.month(), offset);
                let start_day = clamped_date(year, month, day_from)?;
                let (end_year, end_month) = if wraps {
                    shift_month(year, month, 1)
                } else {
                    (year, month)
                };
                let end_day = clamped_date(end_year, end_month, day_to)?;
                push_span(&mut occurrences, zone, start_day, from, end_day, to)?;
            }
        }
    }

    Ok(occurrences)
}

/// Resolve both ends of a span and keep it when it is non-empty. Clamping and
/// DST gaps can collapse a span to nothing.
fn push_span(
    occurrences: &mut Vec<Occurrence>,
    zone: Tz,
    start_day: NaiveDate,
    from: HourMinute,
    end_day: NaiveDate,
    to: HourMinute,
) -> Result<(), CoreError> {
    let start = resolve_local(zone, start_day.and_time(from.time()))?;
    let end = resolve_local(zone, end_day.and_time(to.time()))?;
    if end > start {
        occurrences.push(Occurrence { start, end });
    }
    Ok(())
}

/// Map a wall-clock time in `zone` to an instant.
///
/// On a DST overlap the earlier instant wins. Inside a DST gap the first
/// representable instant after the nominal wall-clock time is used.
fn resolve_local(zone: Tz, local: NaiveDateTime) -> Result<Timestamp, CoreError> {
    if let Some(resolved) = zone.from_local_datetime(&local).earliest() {
        return Ok(resolved.with_timezone(&Utc));
    }
    let mut probe = local;
    for _ in 0..MAX_GAP_MINUTES {
        probe += Duration::minutes(1);
        if let Some(resolved) = zone.from_local_datetime(&probe).earliest() {
            return Ok(resolved.with_timezone(&Utc));
        }
    }
    Err(CoreError::Internal(format!(
        "Wall-clock time {local} does not exist in zone {zone}"
    )))
}

fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = shift_month(year, month, 1);
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

/// The given day of the month, clamped to the month's last day.
fn clamped_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, CoreError> {
    days_in_month(year, month)
        .and_then(|last| NaiveDate::from_ymd_opt(year, month, day.min(last)))
        .ok_or_else(|| CoreError::Internal(format!("Date {year}-{month:02}-{day:02} is out of range")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    fn hm(s: &str) -> HourMinute {
        s.parse().unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn zone(name: &str) -> Tz {
        parse_time_zone(name).unwrap()
    }

    fn active(boundary: Timestamp) -> WindowEvaluation {
        WindowEvaluation {
            is_active: true,
            boundary: Some(boundary),
        }
    }

    fn inactive(boundary: Timestamp) -> WindowEvaluation {
        WindowEvaluation {
            is_active: false,
            boundary: Some(boundary),
        }
    }

    // -----------------------------------------------------------------------
    // Zones
    // -----------------------------------------------------------------------

    #[test]
    fn empty_zone_defaults_to_utc() {
        assert_eq!(parse_time_zone("").unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn unknown_zone_is_a_validation_error() {
        assert_matches!(parse_time_zone("Mars/Olympus_Mons"), Err(CoreError::Validation(_)));
    }

    // -----------------------------------------------------------------------
    // FIXED
    // -----------------------------------------------------------------------

    #[test]
    fn fixed_window_is_half_open() {
        let window = TimeWindow::fixed(utc(2024, 6, 1, 10, 0), utc(2024, 6, 1, 12, 0));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 1, 9, 0), z).unwrap(), inactive(utc(2024, 6, 1, 10, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 1, 10, 0), z).unwrap(), active(utc(2024, 6, 1, 12, 0)));
        assert_eq!(
            evaluate(&window, utc(2024, 6, 1, 12, 0), z).unwrap(),
            WindowEvaluation {
                is_active: false,
                boundary: None
            }
        );
    }

    // -----------------------------------------------------------------------
    // DAILY
    // -----------------------------------------------------------------------

    #[test]
    fn daily_window_inside_and_outside() {
        let window = TimeWindow::daily(hm("10:00"), hm("12:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 1, 11, 0), z).unwrap(), active(utc(2024, 6, 1, 12, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 1, 9, 0), z).unwrap(), inactive(utc(2024, 6, 1, 10, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 1, 14, 0), z).unwrap(), inactive(utc(2024, 6, 2, 10, 0)));
    }

    #[test]
    fn daily_window_spanning_midnight() {
        let window = TimeWindow::daily(hm("22:00"), hm("02:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 3, 10, 1, 30), z).unwrap(), active(utc(2024, 3, 10, 2, 0)));
        assert_eq!(evaluate(&window, utc(2024, 3, 10, 23, 0), z).unwrap(), active(utc(2024, 3, 11, 2, 0)));
        assert_eq!(evaluate(&window, utc(2024, 3, 10, 2, 0), z).unwrap(), inactive(utc(2024, 3, 10, 22, 0)));
    }

    #[test]
    fn daily_window_uses_profile_zone() {
        // 09:00-17:00 in Asia/Kolkata (+05:30) is 03:30-11:30 UTC.
        let window = TimeWindow::daily(hm("09:00"), hm("17:00"));
        let z = zone("Asia/Kolkata");

        assert_eq!(evaluate(&window, utc(2024, 6, 1, 4, 0), z).unwrap(), active(utc(2024, 6, 1, 11, 30)));
        assert_eq!(evaluate(&window, utc(2024, 6, 1, 12, 0), z).unwrap(), inactive(utc(2024, 6, 2, 3, 30)));
    }

    #[test]
    fn dst_gap_moves_start_to_first_valid_instant() {
        // 2024-03-10 is spring-forward in New York; 02:30 local does not exist.
        let window = TimeWindow::daily(hm("02:30"), hm("03:30"));
        let z = zone("America/New_York");

        // 01:00 EST = 06:00 UTC. Next start is 03:00 EDT = 07:00 UTC.
        assert_eq!(evaluate(&window, utc(2024, 3, 10, 6, 0), z).unwrap(), inactive(utc(2024, 3, 10, 7, 0)));
        // 03:10 EDT = 07:10 UTC is inside, ending 03:30 EDT = 07:30 UTC.
        assert_eq!(evaluate(&window, utc(2024, 3, 10, 7, 10), z).unwrap(), active(utc(2024, 3, 10, 7, 30)));
    }

    #[test]
    fn dst_overlap_prefers_earlier_instant() {
        // 2024-11-03 01:30 happens twice in New York; the EDT one (05:30 UTC) wins.
        let window = TimeWindow::daily(hm("01:30"), hm("04:00"));
        let z = zone("America/New_York");

        assert_eq!(evaluate(&window, utc(2024, 11, 3, 5, 0), z).unwrap(), inactive(utc(2024, 11, 3, 5, 30)));
        assert_eq!(evaluate(&window, utc(2024, 11, 3, 6, 0), z).unwrap(), active(utc(2024, 11, 3, 9, 0)));
    }

    // -----------------------------------------------------------------------
    // WEEKLY
    // -----------------------------------------------------------------------

    #[test]
    fn weekly_window_on_selected_days() {
        // Monday and Wednesday, 10:00-12:00. 2024-06-03 is a Monday.
        let window = TimeWindow::weekly(vec![1, 3], hm("10:00"), hm("12:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 3, 11, 0), z).unwrap(), active(utc(2024, 6, 3, 12, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 3, 13, 0), z).unwrap(), inactive(utc(2024, 6, 5, 10, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 6, 9, 0), z).unwrap(), inactive(utc(2024, 6, 10, 10, 0)));
    }

    #[test]
    fn weekly_window_spanning_midnight_into_next_day() {
        // Saturday 22:00 to Sunday 02:00. 2024-06-08 is a Saturday.
        let window = TimeWindow::weekly(vec![6], hm("22:00"), hm("02:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 9, 1, 0), z).unwrap(), active(utc(2024, 6, 9, 2, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 9, 3, 0), z).unwrap(), inactive(utc(2024, 6, 15, 22, 0)));
    }

    // -----------------------------------------------------------------------
    // WEEKLY_RANGE
    // -----------------------------------------------------------------------

    #[test]
    fn weekly_range_wrapping_past_saturday() {
        // Friday 18:00 through Monday 06:00. 2024-06-07 is a Friday.
        let window = TimeWindow::weekly_range(5, hm("18:00"), 1, hm("06:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 8, 12, 0), z).unwrap(), active(utc(2024, 6, 10, 6, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 10, 5, 59), z).unwrap(), active(utc(2024, 6, 10, 6, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 10, 6, 0), z).unwrap(), inactive(utc(2024, 6, 14, 18, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 7, 17, 0), z).unwrap(), inactive(utc(2024, 6, 7, 18, 0)));
    }

    #[test]
    fn weekly_range_same_day_with_earlier_end_spans_full_week() {
        // Wednesday 12:00 to Wednesday 08:00 wraps to the next week.
        let window = TimeWindow::weekly_range(3, hm("12:00"), 3, hm("08:00"));
        let z = zone("UTC");

        // 2024-06-05 is a Wednesday.
        assert_eq!(evaluate(&window, utc(2024, 6, 10, 0, 0), z).unwrap(), active(utc(2024, 6, 12, 8, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 12, 9, 0), z).unwrap(), inactive(utc(2024, 6, 12, 12, 0)));
    }

    #[test]
    fn weekly_range_within_one_day() {
        let window = TimeWindow::weekly_range(2, hm("09:00"), 2, hm("17:00"));
        let z = zone("UTC");

        // 2024-06-04 is a Tuesday.
        assert_eq!(evaluate(&window, utc(2024, 6, 4, 10, 0), z).unwrap(), active(utc(2024, 6, 4, 17, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 4, 18, 0), z).unwrap(), inactive(utc(2024, 6, 11, 9, 0)));
    }

    // -----------------------------------------------------------------------
    // MONTHLY
    // -----------------------------------------------------------------------

    #[test]
    fn monthly_window_within_month() {
        let window = TimeWindow::monthly(15, hm("00:00"), 16, hm("12:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 6, 15, 8, 0), z).unwrap(), active(utc(2024, 6, 16, 12, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 1, 0, 0), z).unwrap(), inactive(utc(2024, 6, 15, 0, 0)));
        assert_eq!(evaluate(&window, utc(2024, 6, 20, 0, 0), z).unwrap(), inactive(utc(2024, 7, 15, 0, 0)));
    }

    #[test]
    fn monthly_window_clamps_to_short_february() {
        // dayFrom 30 clamps to Feb 28 in 2023; the span wraps to March 2.
        let window = TimeWindow::monthly(30, hm("00:00"), 2, hm("23:59"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2023, 2, 10, 0, 0), z).unwrap(), inactive(utc(2023, 2, 28, 0, 0)));
        assert_eq!(evaluate(&window, utc(2023, 2, 28, 6, 0), z).unwrap(), active(utc(2023, 3, 2, 23, 59)));
    }

    #[test]
    fn monthly_window_wrapping_year_end() {
        let window = TimeWindow::monthly(31, hm("18:00"), 1, hm("06:00"));
        let z = zone("UTC");

        assert_eq!(evaluate(&window, utc(2024, 12, 31, 20, 0), z).unwrap(), active(utc(2025, 1, 1, 6, 0)));
        assert_eq!(evaluate(&window, utc(2025, 1, 1, 7, 0), z).unwrap(), inactive(utc(2025, 1, 31, 18, 0)));
    }

    #[test]
    fn recurring_boundary_is_always_after_target() {
        let windows = [
            TimeWindow::daily(hm("22:00"), hm("02:00")),
            TimeWindow::weekly(vec![0, 3], hm("06:00"), hm("07:00")),
            TimeWindow::weekly_range(6, hm("00:00"), 0, hm("23:00")),
            TimeWindow::monthly(28, hm("12:00"), 3, hm("12:00")),
        ];
        let z = zone("Europe/Berlin");
        let mut target = utc(2024, 1, 1, 0, 0);
        while target < utc(2024, 4, 1, 0, 0) {
            for window in &windows {
                let evaluation = evaluate(window, target, z).unwrap();
                let boundary = evaluation.boundary.expect("recurring windows always recur");
                assert!(boundary > target, "{window:?} at {target}: {boundary}");
            }
            target += Duration::minutes(97);
        }
    }

    #[test]
    fn missing_attributes_fail_evaluation() {
        let mut window = TimeWindow::daily(hm("10:00"), hm("12:00"));
        window.hour_minute_to = None;
        assert_matches!(evaluate(&window, utc(2024, 6, 1, 0, 0), zone("UTC")), Err(CoreError::Validation(_)));
    }
}
