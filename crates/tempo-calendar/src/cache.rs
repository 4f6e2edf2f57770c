//! In-memory, date-bucketed store of fetched events and occurrences.
//!
//! The cache lives for one open calendar session. Days are tracked as
//! buckets keyed by [`DateKey`]: a bucket existing (even empty) means the
//! day has been fetched; a missing bucket means unknown. Events referenced
//! by occurrences are fetched lazily and kept for the whole session.

use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::instrument;

use crate::client::PersistenceClient;
use crate::error::CalendarError;
use crate::notify::{ChangeNotifier, Subscription};
use crate::types::{DateKey, Event, EventOccurrence};

#[derive(Default)]
struct CacheState {
    /// Lazily populated, never evicted within a session.
    events: HashMap<i64, Event>,
    /// Per-day occurrences keyed by occurrence id. Present = fetched.
    buckets: HashMap<DateKey, BTreeMap<i64, EventOccurrence>>,
}

/// Client-side cache of occurrences, one bucket per fetched day.
pub struct OccurrenceCache {
    client: PersistenceClient,
    state: Mutex<CacheState>,
    notifier: ChangeNotifier,
}

impl OccurrenceCache {
    pub fn new(client: PersistenceClient) -> Self {
        Self {
            client,
            state: Mutex::new(CacheState::default()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Make every day in the closed range `[start, end]` fetched.
    ///
    /// A range whose days all have buckets is a no-op with no network
    /// traffic. Otherwise one bulk fetch covers the whole range, the
    /// owning event of every returned occurrence is resolved (one request
    /// per distinct missing event, in parallel), and only then are the
    /// buckets written. On failure no bucket is created, so the next call
    /// retries.
    #[instrument(skip(self), level = "info")]
    pub async fn ensure_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), CalendarError> {
        let keys = DateKey::range(start, end);
        {
            let state = self.state.lock();
            if keys.iter().all(|key| state.buckets.contains_key(key)) {
                return Ok(());
            }
        }

        let window_start = start.and_time(NaiveTime::MIN).and_utc();
        let window_end = match end.succ_opt() {
            Some(next) => next.and_time(NaiveTime::MIN).and_utc(),
            None => end.and_time(NaiveTime::MIN).and_utc(),
        };
        let occurrences = self
            .client
            .occurrences_between(window_start, window_end)
            .await?;

        // Resolve owning events before exposing any occurrence: readers
        // immediately need the event's calendarId to filter by calendar.
        let missing_ids: Vec<i64> = {
            let state = self.state.lock();
            occurrences
                .iter()
                .map(|occurrence| occurrence.event_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter(|event_id| !state.events.contains_key(event_id))
                .collect()
        };
        let fetched_events = futures::future::try_join_all(
            missing_ids.iter().map(|&event_id| self.client.event(event_id)),
        )
        .await?;

        let mut state = self.state.lock();
        for event in fetched_events {
            state.events.insert(event.id, event);
        }
        for key in &keys {
            state.buckets.entry(*key).or_default();
        }
        for occurrence in occurrences {
            // Bucketed under the occurrence's own start day, which may lie
            // outside the requested window.
            state
                .buckets
                .entry(occurrence.date_key())
                .or_default()
                .insert(occurrence.id, occurrence);
        }
        Ok(())
    }

    /// Occurrences of one day, chronological (ties by id). Empty for a
    /// day that has no occurrences or has not been fetched.
    pub fn read(&self, key: DateKey) -> Vec<EventOccurrence> {
        let state = self.state.lock();
        let mut occurrences: Vec<EventOccurrence> = state
            .buckets
            .get(&key)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default();
        occurrences.sort_by(|a, b| (a.data.start, a.id).cmp(&(b.data.start, b.id)));
        occurrences
    }

    /// Whether a day has been fetched (bucket present, possibly empty).
    pub fn is_fetched(&self, key: DateKey) -> bool {
        self.state.lock().buckets.contains_key(&key)
    }

    /// A cached event by id.
    pub fn event(&self, event_id: i64) -> Option<Event> {
        self.state.lock().events.get(&event_id).cloned()
    }

    /// Store an event record (after an edit round-trips through the API).
    pub fn put_event(&self, event: Event) {
        self.state.lock().events.insert(event.id, event);
    }

    /// Find an occurrence anywhere in the cache by id.
    pub fn find_occurrence(&self, occurrence_id: i64) -> Option<EventOccurrence> {
        let state = self.state.lock();
        state
            .buckets
            .values()
            .find_map(|bucket| bucket.get(&occurrence_id))
            .cloned()
    }

    /// Drop buckets so the next `ensure_range` touching them refetches.
    pub fn invalidate(&self, keys: impl IntoIterator<Item = DateKey>) {
        let mut state = self.state.lock();
        for key in keys {
            state.buckets.remove(&key);
        }
    }

    /// Write an occurrence into the bucket of its own day. A day that has
    /// not been fetched is left alone; it will be fetched complete later.
    pub fn insert(&self, occurrence: EventOccurrence) {
        let mut state = self.state.lock();
        if let Some(bucket) = state.buckets.get_mut(&occurrence.date_key()) {
            bucket.insert(occurrence.id, occurrence);
        }
    }

    /// Remove an occurrence from its day bucket. The bucket itself stays:
    /// the day is still fetched, just emptier.
    pub fn remove(&self, occurrence: &EventOccurrence) {
        let mut state = self.state.lock();
        if let Some(bucket) = state.buckets.get_mut(&occurrence.date_key()) {
            bucket.remove(&occurrence.id);
        }
    }

    /// Drop every cached instance of an event within the given days.
    pub fn remove_event_in_range(&self, event_id: i64, keys: &[DateKey]) {
        let mut state = self.state.lock();
        for key in keys {
            if let Some(bucket) = state.buckets.get_mut(key) {
                bucket.retain(|_, occurrence| occurrence.event_id != event_id);
            }
        }
    }

    /// Write regenerated occurrences into their day buckets (fetched days
    /// only).
    pub fn merge(&self, occurrences: Vec<EventOccurrence>) {
        let mut state = self.state.lock();
        for occurrence in occurrences {
            if let Some(bucket) = state.buckets.get_mut(&occurrence.date_key()) {
                bucket.insert(occurrence.id, occurrence);
            }
        }
    }

    /// Register a view to be told when buckets are rewritten.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    /// Fire the change notification. Mutation paths call this exactly once
    /// per logical mutation.
    pub fn notify_changed(&self) {
        self.notifier.notify();
    }
}
