//! Time window recurrence model and its persisted JSON encoding.
//!
//! A [`TimeWindow`] is stored as one JSON object per window in the shared
//! window-mapping store, tagged with [`EXPRESSION_FORMAT_RECURRING_TIME_RANGE`].
//! Unknown fields are ignored and absent attributes deserialize as unset.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Expression format tag for windows in the shared mapping store.
pub const EXPRESSION_FORMAT_RECURRING_TIME_RANGE: &str = "RECURRING_TIME_RANGE";

/// Highest valid weekday index (Saturday). Sunday is `0`.
pub const MAX_WEEKDAY: u8 = 6;

/// Highest valid day-of-month.
pub const MAX_DAY_OF_MONTH: u32 = 31;

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// Recurrence kind of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Fixed,
    Daily,
    Weekly,
    WeeklyRange,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "FIXED",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::WeeklyRange => "WEEKLY_RANGE",
            Self::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HourMinute
// ---------------------------------------------------------------------------

/// A wall-clock time of day with minute precision, encoded as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourMinute(NaiveTime);

impl HourMinute {
    /// Build from hour (0..24) and minute (0..60).
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn minute(self) -> u32 {
        self.0.minute()
    }
}

impl FromStr for HourMinute {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid wall-clock time '{s}', expected HH:MM"));

        let (hours, minutes) = s.split_once(':').ok_or_else(invalid)?;
        if hours.is_empty()
            || hours.len() > 2
            || minutes.len() != 2
            || !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let hour: u32 = hours.parse().map_err(|_| invalid())?;
        let minute: u32 = minutes.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for HourMinute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for HourMinute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HourMinute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Weekday encoding
// ---------------------------------------------------------------------------

/// Convert a weekday index (Sunday = 0) to a [`Weekday`].
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Convert a [`Weekday`] to its index (Sunday = 0).
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// One recurrence specification inside a deployment window profile.
///
/// Which attributes are meaningful depends on [`Frequency`]:
///
/// | Frequency      | Required attributes                                  |
/// |----------------|------------------------------------------------------|
/// | `FIXED`        | `timeFrom`, `timeTo`                                 |
/// | `DAILY`        | `hourMinuteFrom`, `hourMinuteTo`                     |
/// | `WEEKLY`       | `weekdays`, `hourMinuteFrom`, `hourMinuteTo`         |
/// | `WEEKLY_RANGE` | `weekdayFrom`, `weekdayTo`, `hourMinuteFrom/To`      |
/// | `MONTHLY`      | `dayFrom`, `dayTo`, `hourMinuteFrom/To`              |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_minute_from: Option<HourMinute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_minute_to: Option<HourMinute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekdays: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday_from: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday_to: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_to: Option<u32>,
}

impl TimeWindow {
    fn empty(frequency: Frequency) -> Self {
        Self {
            frequency,
            time_from: None,
            time_to: None,
            hour_minute_from: None,
            hour_minute_to: None,
            weekdays: Vec::new(),
            weekday_from: None,
            weekday_to: None,
            day_from: None,
            day_to: None,
        }
    }

    /// A one-shot window `[from, to)`.
    pub fn fixed(from: Timestamp, to: Timestamp) -> Self {
        Self {
            time_from: Some(from),
            time_to: Some(to),
            ..Self::empty(Frequency::Fixed)
        }
    }

    /// A window recurring every day between two wall-clock times.
    pub fn daily(from: HourMinute, to: HourMinute) -> Self {
        Self {
            hour_minute_from: Some(from),
            hour_minute_to: Some(to),
            ..Self::empty(Frequency::Daily)
        }
    }

    /// A daily-shaped window recurring only on the given weekdays (Sunday = 0).
    pub fn weekly(weekdays: Vec<u8>, from: HourMinute, to: HourMinute) -> Self {
        Self {
            weekdays,
            hour_minute_from: Some(from),
            hour_minute_to: Some(to),
            ..Self::empty(Frequency::Weekly)
        }
    }

    /// One continuous span per week from `weekday_from@from` to `weekday_to@to`.
    pub fn weekly_range(weekday_from: u8, from: HourMinute, weekday_to: u8, to: HourMinute) -> Self {
        Self {
            weekday_from: Some(weekday_from),
            weekday_to: Some(weekday_to),
            hour_minute_from: Some(from),
            hour_minute_to: Some(to),
            ..Self::empty(Frequency::WeeklyRange)
        }
    }

    /// One continuous span per month from `day_from@from` to `day_to@to`.
    pub fn monthly(day_from: u32, from: HourMinute, day_to: u32, to: HourMinute) -> Self {
        Self {
            day_from: Some(day_from),
            day_to: Some(day_to),
            hour_minute_from: Some(from),
            hour_minute_to: Some(to),
            ..Self::empty(Frequency::Monthly)
        }
    }

    /// Parse a window from its persisted JSON encoding.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        Self::deserialize(value)
            .map_err(|e| CoreError::Validation(format!("Malformed time window: {e}")))
    }

    /// Encode the window for the window-mapping store.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Check that exactly the attributes required by the frequency are set
    /// and that each of them is in range.
    pub fn validate(&self) -> Result<(), CoreError> {
        let has_fixed = self.time_from.is_some() || self.time_to.is_some();
        let has_clock = self.hour_minute_from.is_some() || self.hour_minute_to.is_some();
        let has_weekdays = !self.weekdays.is_empty();
        let has_weekday_range = self.weekday_from.is_some() || self.weekday_to.is_some();
        let has_days = self.day_from.is_some() || self.day_to.is_some();

        let (fixed, clock, weekdays, weekday_range, days) = match self.frequency {
            Frequency::Fixed => (true, false, false, false, false),
            Frequency::Daily => (false, true, false, false, false),
            Frequency::Weekly => (false, true, true, false, false),
            Frequency::WeeklyRange => (false, true, false, true, false),
            Frequency::Monthly => (false, true, false, false, true),
        };

        for (name, present, wanted) in [
            ("timeFrom/timeTo", has_fixed, fixed),
            ("hourMinuteFrom/hourMinuteTo", has_clock, clock),
            ("weekdays", has_weekdays, weekdays),
            ("weekdayFrom/weekdayTo", has_weekday_range, weekday_range),
            ("dayFrom/dayTo", has_days, days),
        ] {
            if present && !wanted {
                return Err(CoreError::Validation(format!(
                    "{name} must not be set for a {} window",
                    self.frequency
                )));
            }
        }

        match self.frequency {
            Frequency::Fixed => {
                let (from, to) = self.fixed_range()?;
                if from >= to {
                    return Err(CoreError::Validation(
                        "timeFrom must be before timeTo".to_string(),
                    ));
                }
                Ok(())
            }
            Frequency::Daily => self.clock_range().map(|_| ()),
            Frequency::Weekly => {
                self.clock_range()?;
                self.weekday_set().map(|_| ())
            }
            Frequency::WeeklyRange => {
                self.clock_range()?;
                self.weekday_span().map(|_| ())
            }
            Frequency::Monthly => {
                self.clock_range()?;
                self.day_span().map(|_| ())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Attribute accessors shared by validation and evaluation
    // -----------------------------------------------------------------------

    pub(crate) fn fixed_range(&self) -> Result<(Timestamp, Timestamp), CoreError> {
        match (self.time_from, self.time_to) {
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(missing(self.frequency, "timeFrom and timeTo")),
        }
    }

    pub(crate) fn clock_range(&self) -> Result<(HourMinute, HourMinute), CoreError> {
        let (from, to) = match (self.hour_minute_from, self.hour_minute_to) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(missing(self.frequency, "hourMinuteFrom and hourMinuteTo")),
        };
        if from == to {
            return Err(CoreError::Validation(format!(
                "hourMinuteFrom and hourMinuteTo must differ (both {from})"
            )));
        }
        Ok((from, to))
    }

    pub(crate) fn weekday_set(&self) -> Result<Vec<Weekday>, CoreError> {
        if self.weekdays.is_empty() {
            return Err(missing(self.frequency, "weekdays"));
        }
        self.weekdays
            .iter()
            .map(|&index| weekday_from_index(index).ok_or_else(|| bad_weekday(index)))
            .collect()
    }

    pub(crate) fn weekday_span(&self) -> Result<(Weekday, Weekday), CoreError> {
        match (self.weekday_from, self.weekday_to) {
            (Some(from), Some(to)) => Ok((
                weekday_from_index(from).ok_or_else(|| bad_weekday(from))?,
                weekday_from_index(to).ok_or_else(|| bad_weekday(to))?,
            )),
            _ => Err(missing(self.frequency, "weekdayFrom and weekdayTo")),
        }
    }

    pub(crate) fn day_span(&self) -> Result<(u32, u32), CoreError> {
        match (self.day_from, self.day_to) {
            (Some(from), Some(to)) => {
                for day in [from, to] {
                    if !(1..=MAX_DAY_OF_MONTH).contains(&day) {
                        return Err(CoreError::Validation(format!(
                            "Day of month {day} is out of range 1..{MAX_DAY_OF_MONTH}"
                        )));
                    }
                }
                Ok((from, to))
            }
            _ => Err(missing(self.frequency, "dayFrom and dayTo")),
        }
    }
}

fn missing(frequency: Frequency, what: &str) -> CoreError {
    CoreError::Validation(format!("{frequency} window requires {what}"))
}

fn bad_weekday(index: u8) -> CoreError {
    CoreError::Validation(format!(
        "Weekday {index} is out of range 0..{MAX_WEEKDAY} (Sunday = 0)"
    ))
}
