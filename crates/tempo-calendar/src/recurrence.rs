//! Weekly recurrence rules.
//!
//! A rule is a subset of weekdays repeated weekly between two calendar
//! dates. On the wire the weekday subset is a 7-character string, one letter
//! per day starting Sunday, uppercase meaning the day is enabled
//! (e.g. `"sMtWtFs"` for Mon/Wed/Fri).

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use std::fmt;

use crate::error::CalendarError;

/// Hard ceiling on how many weeks a single regeneration may span.
pub const MAX_GENERATED_WEEKS: u32 = 40;

/// Canonical weekday letters, Sunday first.
const DAY_LETTERS: [char; 7] = ['S', 'M', 'T', 'W', 'T', 'F', 'S'];

/// The set of weekdays an event repeats on, Sunday-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySet([bool; 7]);

impl WeekdaySet {
    /// A set with every weekday enabled.
    pub const EVERY_DAY: WeekdaySet = WeekdaySet([true; 7]);

    /// Parse the wire form. Requires exactly 7 alphabetic characters;
    /// anything else is rejected, never corrected.
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 7 {
            return Err(CalendarError::validation(format!(
                "daysOfWeek must have exactly 7 characters, got {}",
                chars.len()
            )));
        }
        let mut days = [false; 7];
        for (index, c) in chars.iter().enumerate() {
            if !c.is_ascii_alphabetic() {
                return Err(CalendarError::validation(format!(
                    "daysOfWeek may only contain letters, got '{}'",
                    c
                )));
            }
            days[index] = c.is_ascii_uppercase();
        }
        Ok(Self(days))
    }

    /// Build from explicit flags, Sunday first.
    pub fn from_flags(days: [bool; 7]) -> Self {
        Self(days)
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_sunday() as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|enabled| !enabled)
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|enabled| **enabled).count()
    }

    /// Day offsets relative to the day *after* `anchor`, for one week of
    /// generation. An offset `o` means the day `anchor + o + 1`; the anchor's
    /// own weekday therefore only appears as offset 6 (a full week later).
    pub fn offsets_after(&self, anchor: Weekday) -> Vec<u32> {
        let base = anchor.num_days_from_sunday() as usize + 1;
        (0..7)
            .filter(|offset| self.0[(base + offset) % 7])
            .map(|offset| offset as u32)
            .collect()
    }

    /// The wire form: canonical letters, enabled days uppercased.
    pub fn as_wire(&self) -> String {
        DAY_LETTERS
            .iter()
            .zip(self.0.iter())
            .map(|(letter, enabled)| {
                if *enabled {
                    *letter
                } else {
                    letter.to_ascii_lowercase()
                }
            })
            .collect()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A weekly recurrence bounded by an explicit date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub weekdays: WeekdaySet,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RecurrenceRule {
    /// Check the `end >= start` invariant.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.end < self.start {
            return Err(CalendarError::validation(format!(
                "event ends ({}) before it starts ({})",
                self.end, self.start
            )));
        }
        Ok(())
    }

    /// How many weeks of instances to generate from an anchor timestamp to
    /// the end of the rule's range.
    ///
    /// The difference is taken between calendar dates (time of day
    /// discarded) so that a late-evening anchor cannot shift the count.
    pub fn repeat_weeks_from(&self, anchor_start: DateTime<Utc>) -> u32 {
        let days = (self.end - anchor_start.date_naive()).num_days();
        let weeks = (days as f64 / 7.0).round();
        weeks.clamp(0.0, f64::from(MAX_GENERATED_WEEKS)) as u32
    }
}
