//! Calendar entities as stored locally, plus their wire representations.
//!
//! The persistence API speaks camelCase JSON with ISO-8601 timestamps; the
//! `Api*` structs mirror that shape and are converted into the domain types
//! at the boundary.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::CalendarError;
use crate::recurrence::{RecurrenceRule, WeekdaySet};

/// Calendar metadata. Calendars group events and carry the color used as the
/// border of their occurrences.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    /// Seeds the enabled-calendars filter on first load.
    pub is_enabled: bool,
}

/// A recurring event template. Occurrences are generated from it within
/// `[start_date, end_date]` on the enabled weekdays.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub default_start_time: NaiveTime,
    pub default_end_time: NaiveTime,
    pub days_of_week: WeekdaySet,
    pub default_color: String,
    pub calendar_id: i64,
}

impl Event {
    /// The recurrence rule bounded by this event's date range.
    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            weekdays: self.days_of_week,
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Convert API response to local Event.
    ///
    /// Rejects malformed `daysOfWeek` strings and inverted date ranges
    /// rather than correcting them.
    pub fn from_api(api: ApiEventRecord) -> Result<Self, CalendarError> {
        let days_of_week = WeekdaySet::parse(&api.days_of_week)?;
        let event = Self {
            id: api.id,
            start_date: api.start_date.date_naive(),
            end_date: api.end_date.date_naive(),
            default_start_time: api.default_start_time.time(),
            default_end_time: api.default_end_time.time(),
            days_of_week,
            default_color: api.default_color,
            calendar_id: api.calendar_id,
        };
        event.rule().validate()?;
        Ok(event)
    }
}

/// The user-editable fields of an occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceData {
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Per-instance color; may differ from the owning event's default.
    pub color: String,
}

impl OccurrenceData {
    /// Check the `end > start` invariant.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.end <= self.start {
            return Err(CalendarError::validation(
                "occurrence must end after it starts",
            ));
        }
        Ok(())
    }

    /// Length of the occurrence.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// One concrete, dated instance of an event, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOccurrence {
    pub id: i64,
    pub event_id: i64,
    pub data: OccurrenceData,
}

impl EventOccurrence {
    /// The cache key for the day this occurrence starts on.
    pub fn date_key(&self) -> DateKey {
        DateKey::from_datetime(&self.data.start)
    }

    /// Whether the occurrence has fully elapsed (used for dimming).
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.data.end < now
    }
}

/// An occurrence in the edit flow: either not yet persisted, or saved with
/// server-assigned identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    Draft(OccurrenceData),
    Saved(EventOccurrence),
}

impl Occurrence {
    pub fn data(&self) -> &OccurrenceData {
        match self {
            Occurrence::Draft(data) => data,
            Occurrence::Saved(occurrence) => &occurrence.data,
        }
    }

    pub fn saved(&self) -> Option<&EventOccurrence> {
        match self {
            Occurrence::Draft(_) => None,
            Occurrence::Saved(occurrence) => Some(occurrence),
        }
    }
}

/// A calendar day used as a cache key.
///
/// Serializes to a fixed `%Y-%m-%d` form so that keys are stable across
/// locales and collision-free per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Key for the day a timestamp falls on.
    pub fn from_datetime(datetime: &DateTime<Utc>) -> Self {
        Self(datetime.date_naive())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Every day in the closed interval `[start, end]`, in order.
    /// Empty when `end < start`.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Vec<DateKey> {
        let mut keys = Vec::new();
        let mut day = start;
        while day <= end {
            keys.push(DateKey(day));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        keys
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateKey)
            .map_err(|e| CalendarError::validation(format!("invalid date key '{}': {}", s, e)))
    }
}

// API Response Types

/// Calendar record as returned by the persistence API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCalendarRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
    #[serde(default)]
    pub is_enabled: u8,
}

impl From<ApiCalendarRecord> for Calendar {
    fn from(api: ApiCalendarRecord) -> Self {
        Self {
            id: api.id,
            name: api.name,
            description: api.description,
            color: api.color,
            is_enabled: api.is_enabled != 0,
        }
    }
}

/// Event record as returned by the persistence API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventRecord {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub default_start_time: DateTime<Utc>,
    pub default_end_time: DateTime<Utc>,
    pub days_of_week: String,
    #[serde(default)]
    pub default_color: String,
    pub calendar_id: i64,
}

/// Occurrence record as returned by the persistence API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOccurrenceRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(default)]
    pub color: String,
    pub event_id: i64,
}

impl From<ApiOccurrenceRecord> for EventOccurrence {
    fn from(api: ApiOccurrenceRecord) -> Self {
        Self {
            id: api.id,
            event_id: api.event_id,
            data: OccurrenceData {
                name: api.name,
                description: api.description,
                start: api.start_date_time,
                end: api.end_date_time,
                color: api.color,
            },
        }
    }
}
