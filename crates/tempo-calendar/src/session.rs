//! Per-page calendar session: one cache, one client, one engine.
//!
//! A session is created when the calendar opens and passed by reference to
//! every consumer; nothing here is process-global. Mutation methods rewrite
//! the affected cache buckets and fire the change notification exactly once
//! per logical mutation.

use chrono::{Days, NaiveDate};
use parking_lot::Mutex;
use tracing::instrument;

use crate::cache::OccurrenceCache;
use crate::client::PersistenceClient;
use crate::engine::MaterializationEngine;
use crate::error::CalendarError;
use crate::notify::Subscription;
use crate::types::{Calendar, DateKey, Event, EventOccurrence, Occurrence, OccurrenceData};

/// An occurrence paired with its owning event, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceView {
    pub occurrence: EventOccurrence,
    pub event: Event,
}

pub struct CalendarSession {
    client: PersistenceClient,
    cache: OccurrenceCache,
    engine: MaterializationEngine,
    calendars: Mutex<Option<Vec<Calendar>>>,
}

impl CalendarSession {
    pub fn new(client: PersistenceClient) -> Self {
        Self {
            cache: OccurrenceCache::new(client.clone()),
            engine: MaterializationEngine::new(client.clone()),
            client,
            calendars: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &OccurrenceCache {
        &self.cache
    }

    /// Register a view for change notifications.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.cache.subscribe(listener)
    }

    /// All calendars, fetched once per session.
    pub async fn calendars(&self) -> Result<Vec<Calendar>, CalendarError> {
        if let Some(calendars) = self.calendars.lock().clone() {
            return Ok(calendars);
        }
        let calendars = self.client.list_calendars().await?;
        *self.calendars.lock() = Some(calendars.clone());
        Ok(calendars)
    }

    /// Calendar ids enabled by default (seeded from the stored flag).
    pub async fn enabled_calendar_ids(&self) -> Result<Vec<i64>, CalendarError> {
        Ok(self
            .calendars()
            .await?
            .into_iter()
            .filter(|calendar| calendar.is_enabled)
            .map(|calendar| calendar.id)
            .collect())
    }

    /// Occurrences of `[start, end]` on the enabled calendars, paired with
    /// their events and sorted chronologically. Fetches only uncovered
    /// days.
    #[instrument(skip(self, enabled_calendars), level = "info")]
    pub async fn visible_occurrences(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        enabled_calendars: &[i64],
    ) -> Result<Vec<OccurrenceView>, CalendarError> {
        self.cache.ensure_range(start, end).await?;

        let mut views = Vec::new();
        for key in DateKey::range(start, end) {
            for occurrence in self.cache.read(key) {
                let Some(event) = self.cache.event(occurrence.event_id) else {
                    continue;
                };
                if enabled_calendars.contains(&event.calendar_id) {
                    views.push(OccurrenceView { occurrence, event });
                }
            }
        }
        views.sort_by(|a, b| {
            (a.occurrence.data.start, a.occurrence.id)
                .cmp(&(b.occurrence.data.start, b.occurrence.id))
        });
        Ok(views)
    }

    /// Persist an occurrence from the edit flow: drafts are created,
    /// saved occurrences are updated (and moved across day buckets when
    /// their start day changed).
    #[instrument(skip(self, occurrence), level = "info")]
    pub async fn save_occurrence(
        &self,
        event_id: i64,
        occurrence: Occurrence,
    ) -> Result<EventOccurrence, CalendarError> {
        match occurrence {
            Occurrence::Draft(data) => self.create_occurrence(event_id, data).await,
            Occurrence::Saved(updated) => {
                if updated.event_id != event_id {
                    return Err(CalendarError::validation(format!(
                        "occurrence {} belongs to event {}, not {}",
                        updated.id, updated.event_id, event_id
                    )));
                }
                let saved = self.client.update_occurrence(&updated).await?;
                if let Some(previous) = self.cache.find_occurrence(saved.id) {
                    self.cache.remove(&previous);
                }
                self.cache.insert(saved.clone());
                self.cache.notify_changed();
                Ok(saved)
            }
        }
    }

    /// Create a single occurrence.
    #[instrument(skip(self, data), level = "info")]
    pub async fn create_occurrence(
        &self,
        event_id: i64,
        data: OccurrenceData,
    ) -> Result<EventOccurrence, CalendarError> {
        let created = self.client.create_occurrence(event_id, &data).await?;
        self.cache.insert(created.clone());
        self.cache.notify_changed();
        Ok(created)
    }

    /// Delete a single occurrence.
    #[instrument(skip(self, occurrence), level = "info")]
    pub async fn delete_occurrence(
        &self,
        occurrence: &EventOccurrence,
    ) -> Result<(), CalendarError> {
        self.client.delete_occurrence(occurrence.id).await?;
        self.cache.remove(occurrence);
        self.cache.notify_changed();
        Ok(())
    }

    /// Update an event template and keep the cached copy in sync.
    #[instrument(skip(self, event), level = "info")]
    pub async fn update_event(&self, event: &Event) -> Result<Event, CalendarError> {
        let updated = self.client.update_event(event).await?;
        self.cache.put_event(updated.clone());
        self.cache.notify_changed();
        Ok(updated)
    }

    /// Rebuild an event's future instances after an edit to the series.
    ///
    /// On success the stale instances are dropped from the affected day
    /// buckets and the regenerated ones merged in. On any failure the whole
    /// affected range is invalidated so a truncated series is never shown
    /// as complete; the error still propagates.
    #[instrument(skip(self, event, anchor), level = "info")]
    pub async fn regenerate_series(
        &self,
        event: &Event,
        anchor: &EventOccurrence,
    ) -> Result<Vec<EventOccurrence>, CalendarError> {
        let affected = self.affected_range(event, anchor);

        match self.engine.regenerate_from(event.id, anchor.id).await {
            Ok(created) => {
                self.cache.remove_event_in_range(event.id, &affected);
                self.cache.merge(created.clone());
                self.cache.notify_changed();
                Ok(created)
            }
            Err(error) => {
                self.cache.invalidate(affected);
                self.cache.notify_changed();
                Err(error)
            }
        }
    }

    /// Days whose buckets may hold instances of the series: from the day
    /// after the anchor to the end of the event's range, with a week of
    /// slack for instances generated past the end date.
    fn affected_range(&self, event: &Event, anchor: &EventOccurrence) -> Vec<DateKey> {
        let anchor_day = anchor.data.start.date_naive();
        let first = anchor_day.checked_add_days(Days::new(1)).unwrap_or(anchor_day);
        let last = event.end_date.max(anchor_day);
        let horizon = last.checked_add_days(Days::new(8)).unwrap_or(last);
        DateKey::range(first, horizon)
    }
}
