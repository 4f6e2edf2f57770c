//! Calendar core for Tempo.
//!
//! Events repeat weekly on a subset of weekdays within an explicit date
//! range and materialize into dated occurrences. This crate provides the
//! persistence API client, the date-bucketed occurrence cache with change
//! notification, and the series materialization engine, tied together by a
//! per-page session.

pub mod cache;
pub mod client;
pub mod engine;
pub mod error;
pub mod notify;
pub mod recurrence;
pub mod session;
pub mod types;

pub use cache::OccurrenceCache;
pub use client::PersistenceClient;
pub use engine::{plan_regeneration, MaterializationEngine};
pub use error::CalendarError;
pub use notify::{ChangeNotifier, Subscription};
pub use recurrence::{RecurrenceRule, WeekdaySet, MAX_GENERATED_WEEKS};
pub use session::{CalendarSession, OccurrenceView};
pub use types::{
    Calendar, DateKey, Event, EventOccurrence, Occurrence, OccurrenceData,
};
