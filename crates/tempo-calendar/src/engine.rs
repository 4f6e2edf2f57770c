//! Series materialization: turning a recurrence rule into concrete
//! occurrences.
//!
//! Regeneration is anchored at an edited occurrence: everything strictly
//! after the anchor is deleted and rebuilt from the rule; the anchor and
//! anything before it (already-passed instances) are left untouched.

use chrono::{Datelike, Duration};
use tracing::instrument;

use crate::client::PersistenceClient;
use crate::error::CalendarError;
use crate::types::{Event, EventOccurrence, OccurrenceData};

/// Compute the instances that follow an anchor occurrence, without touching
/// persistence.
///
/// Instances start at `anchor + (week * 7 + offset + 1)` days, carry the
/// anchor's duration verbatim, and copy its name, description and color.
/// An empty weekday set or a zero-week window yields an empty plan: the
/// event is a single, non-repeating instance.
pub fn plan_regeneration(
    event: &Event,
    anchor: &EventOccurrence,
) -> Result<Vec<OccurrenceData>, CalendarError> {
    let rule = event.rule();
    rule.validate()?;
    anchor.data.validate()?;

    let weeks = rule.repeat_weeks_from(anchor.data.start);
    let offsets = rule.weekdays.offsets_after(anchor.data.start.weekday());
    let duration = anchor.data.duration();

    let mut planned = Vec::with_capacity(weeks as usize * offsets.len());
    for week in 0..weeks {
        for &offset in &offsets {
            let start = anchor.data.start + Duration::days(i64::from(week * 7 + offset + 1));
            planned.push(OccurrenceData {
                name: anchor.data.name.clone(),
                description: anchor.data.description.clone(),
                start,
                end: start + duration,
                color: anchor.data.color.clone(),
            });
        }
    }
    Ok(planned)
}

/// Rebuilds an event's future instances through the persistence API.
pub struct MaterializationEngine {
    client: PersistenceClient,
}

impl MaterializationEngine {
    pub fn new(client: PersistenceClient) -> Self {
        Self { client }
    }

    /// Delete every occurrence of the event strictly after the anchor and
    /// recreate the series from the rule. Returns the created occurrences.
    ///
    /// Nothing is deleted unless both the event and the anchor occurrence
    /// exist and the event validates. If a create fails after deletion has
    /// happened, the series is left truncated and the failure is reported
    /// as [`CalendarError::PartialRegeneration`]; the caller is expected
    /// to invalidate the affected range so the truth is refetched.
    #[instrument(skip(self), level = "info")]
    pub async fn regenerate_from(
        &self,
        event_id: i64,
        occurrence_id: i64,
    ) -> Result<Vec<EventOccurrence>, CalendarError> {
        let event = self.client.event(event_id).await?;
        let anchor = self.client.occurrence(occurrence_id).await?;
        let planned = plan_regeneration(&event, &anchor)?;

        let stale = self
            .client
            .occurrences_for_event_after(event_id, anchor.data.start)
            .await?;
        for occurrence in &stale {
            self.client.delete_occurrence(occurrence.id).await?;
        }
        tracing::debug!(
            deleted = stale.len(),
            planned = planned.len(),
            "regenerating series"
        );

        let total = planned.len();
        let mut created = Vec::with_capacity(total);
        for data in planned {
            match self.client.create_occurrence(event_id, &data).await {
                Ok(occurrence) => created.push(occurrence),
                Err(source) => {
                    return Err(CalendarError::PartialRegeneration {
                        created: created.len(),
                        planned: total,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(created)
    }
}
