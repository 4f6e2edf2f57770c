//! HTTP client for the calendar persistence API.
//!
//! The backend exposes plain JSON record endpoints under `/api/table/`,
//! a bulk occurrence query filtered by `startDateTime` bounds, and a
//! server-side series regeneration endpoint.

use chrono::{DateTime, NaiveTime, Utc};
use tracing::instrument;

use crate::error::CalendarError;
use crate::recurrence::RecurrenceRule;
use crate::types::*;

#[derive(Clone)]
pub struct PersistenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl PersistenceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// List all calendars.
    #[instrument(skip(self), level = "info")]
    pub async fn list_calendars(&self) -> Result<Vec<Calendar>, CalendarError> {
        let url = format!("{}/api/table/calendar", self.base_url);

        let response = self.client.get(&url).send().await?;
        let records: Vec<ApiCalendarRecord> = Self::read_json(response).await?;
        Ok(records.into_iter().map(Calendar::from).collect())
    }

    /// Get a single event.
    #[instrument(skip(self), level = "info")]
    pub async fn event(&self, event_id: i64) -> Result<Event, CalendarError> {
        let url = format!("{}/api/table/event/{}", self.base_url, event_id);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Event", event_id));
        }
        let record: ApiEventRecord = Self::read_json(response).await?;
        Event::from_api(record)
    }

    /// Create a new event template.
    #[instrument(skip(self), level = "info")]
    pub async fn create_event(
        &self,
        calendar_id: i64,
        rule: RecurrenceRule,
        default_start_time: NaiveTime,
        default_end_time: NaiveTime,
        default_color: &str,
    ) -> Result<Event, CalendarError> {
        rule.validate()?;
        let url = format!("{}/api/table/event", self.base_url);

        let body = serde_json::json!({
            "startDate": day_timestamp(rule.start, NaiveTime::MIN),
            "endDate": day_timestamp(rule.end, NaiveTime::MIN),
            "defaultStartTime": day_timestamp(rule.start, default_start_time),
            "defaultEndTime": day_timestamp(rule.start, default_end_time),
            "daysOfWeek": rule.weekdays.as_wire(),
            "defaultColor": default_color,
            "calendarId": calendar_id,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let record: ApiEventRecord = Self::read_json(response).await?;
        Event::from_api(record)
    }

    /// Update an existing event template.
    #[instrument(skip(self, event), level = "info")]
    pub async fn update_event(&self, event: &Event) -> Result<Event, CalendarError> {
        event.rule().validate()?;
        let url = format!("{}/api/table/event/{}", self.base_url, event.id);

        let body = serde_json::json!({
            "id": event.id,
            "startDate": day_timestamp(event.start_date, NaiveTime::MIN),
            "endDate": day_timestamp(event.end_date, NaiveTime::MIN),
            "defaultStartTime": day_timestamp(event.start_date, event.default_start_time),
            "defaultEndTime": day_timestamp(event.start_date, event.default_end_time),
            "daysOfWeek": event.days_of_week.as_wire(),
            "defaultColor": event.default_color,
            "calendarId": event.calendar_id,
        });

        let response = self.client.put(&url).json(&body).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Event", event.id));
        }
        let record: ApiEventRecord = Self::read_json(response).await?;
        Event::from_api(record)
    }

    /// Delete an event template.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, event_id: i64) -> Result<(), CalendarError> {
        let url = format!("{}/api/table/event/{}", self.base_url, event_id);

        let response = self.client.delete(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Event", event_id));
        }
        Self::ensure_success(response).await
    }

    /// Get a single occurrence.
    #[instrument(skip(self), level = "info")]
    pub async fn occurrence(&self, occurrence_id: i64) -> Result<EventOccurrence, CalendarError> {
        let url = format!("{}/api/table/eventOccurrence/{}", self.base_url, occurrence_id);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Occurrence", occurrence_id));
        }
        let record: ApiOccurrenceRecord = Self::read_json(response).await?;
        Ok(EventOccurrence::from(record))
    }

    /// Bulk query: every occurrence starting within `[start, end)`.
    #[instrument(skip(self), level = "info")]
    pub async fn occurrences_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventOccurrence>, CalendarError> {
        let url = format!(
            "{}/api/table/eventOccurrence/?startDateTime_greaterEqual={}&startDateTime_smaller={}",
            self.base_url,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        let response = self.client.get(&url).send().await?;
        let records: Vec<ApiOccurrenceRecord> = Self::read_json(response).await?;
        Ok(records.into_iter().map(EventOccurrence::from).collect())
    }

    /// Every occurrence of an event starting strictly after `after`.
    #[instrument(skip(self), level = "info")]
    pub async fn occurrences_for_event_after(
        &self,
        event_id: i64,
        after: DateTime<Utc>,
    ) -> Result<Vec<EventOccurrence>, CalendarError> {
        let url = format!(
            "{}/api/table/eventOccurrence/?eventId={}&startDateTime_greater={}",
            self.base_url,
            event_id,
            urlencoding::encode(&after.to_rfc3339()),
        );

        let response = self.client.get(&url).send().await?;
        let records: Vec<ApiOccurrenceRecord> = Self::read_json(response).await?;
        Ok(records.into_iter().map(EventOccurrence::from).collect())
    }

    /// Create a new occurrence; the backend assigns the id.
    #[instrument(skip(self, data), level = "info")]
    pub async fn create_occurrence(
        &self,
        event_id: i64,
        data: &OccurrenceData,
    ) -> Result<EventOccurrence, CalendarError> {
        data.validate()?;
        let url = format!("{}/api/table/eventOccurrence", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&occurrence_body(event_id, data))
            .send()
            .await?;
        let record: ApiOccurrenceRecord = Self::read_json(response).await?;
        Ok(EventOccurrence::from(record))
    }

    /// Update an existing occurrence.
    #[instrument(skip(self, occurrence), level = "info")]
    pub async fn update_occurrence(
        &self,
        occurrence: &EventOccurrence,
    ) -> Result<EventOccurrence, CalendarError> {
        occurrence.data.validate()?;
        let url = format!(
            "{}/api/table/eventOccurrence/{}",
            self.base_url, occurrence.id
        );

        let response = self
            .client
            .put(&url)
            .json(&occurrence_body(occurrence.event_id, &occurrence.data))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Occurrence", occurrence.id));
        }
        let record: ApiOccurrenceRecord = Self::read_json(response).await?;
        Ok(EventOccurrence::from(record))
    }

    /// Delete an occurrence.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_occurrence(&self, occurrence_id: i64) -> Result<(), CalendarError> {
        let url = format!(
            "{}/api/table/eventOccurrence/{}",
            self.base_url, occurrence_id
        );

        let response = self.client.delete(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Occurrence", occurrence_id));
        }
        Self::ensure_success(response).await
    }

    /// Ask the backend to rebuild an event's future instances from an
    /// anchor occurrence. Returns the newly created occurrences.
    #[instrument(skip(self), level = "info")]
    pub async fn recalculate_from(
        &self,
        event_id: i64,
        occurrence_id: i64,
    ) -> Result<Vec<EventOccurrence>, CalendarError> {
        let url = format!(
            "{}/api/table/event/{}/recalculateFrom/{}",
            self.base_url, event_id, occurrence_id
        );

        let response = self.client.post(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalendarError::not_found("Event", event_id));
        }
        let records: Vec<ApiOccurrenceRecord> = Self::read_json(response).await?;
        Ok(records.into_iter().map(EventOccurrence::from).collect())
    }

    /// Helper to parse successful responses and surface API errors.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| CalendarError::Api {
                status: status.as_u16(),
                message: format!("JSON parse error: {}", e),
            })
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<(), CalendarError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

fn day_timestamp(date: chrono::NaiveDate, time: NaiveTime) -> String {
    date.and_time(time).and_utc().to_rfc3339()
}

fn occurrence_body(event_id: i64, data: &OccurrenceData) -> serde_json::Value {
    serde_json::json!({
        "name": data.name,
        "description": data.description,
        "startDateTime": data.start.to_rfc3339(),
        "endDateTime": data.end.to_rfc3339(),
        "color": data.color,
        "eventId": event_id,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::recurrence::WeekdaySet;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn occurrence_record(id: i64, event_id: i64, start: &str, end: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": "Standup",
            "description": "",
            "startDateTime": start,
            "endDateTime": end,
            "color": "#00ff00",
            "eventId": event_id,
        })
    }

    #[tokio::test]
    async fn test_list_calendars() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/table/calendar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "name": "Work", "description": "", "color": "#ff0000", "isEnabled": 1},
                {"id": 2, "name": "Home", "description": "", "color": "#00ff00", "isEnabled": 0}
            ])))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let calendars = client.list_calendars().await.unwrap();

        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].is_enabled);
        assert!(!calendars[1].is_enabled);
    }

    #[tokio::test]
    async fn test_event_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/table/event/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let result = client.event(9).await;

        assert!(matches!(
            result,
            Err(CalendarError::NotFound { kind: "Event", id: 9 })
        ));
    }

    #[tokio::test]
    async fn test_occurrences_between_sends_bounds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/table/eventOccurrence/"))
            .and(query_param(
                "startDateTime_greaterEqual",
                "2024-01-01T00:00:00+00:00",
            ))
            .and(query_param(
                "startDateTime_smaller",
                "2024-01-08T00:00:00+00:00",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                occurrence_record(1, 7, "2024-01-03T09:00:00Z", "2024-01-03T10:00:00Z")
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let occurrences = client
            .occurrences_between(
                timestamp("2024-01-01T00:00:00Z"),
                timestamp("2024-01-08T00:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].event_id, 7);
    }

    #[tokio::test]
    async fn test_occurrences_for_event_after() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/table/eventOccurrence/"))
            .and(query_param("eventId", "7"))
            .and(query_param(
                "startDateTime_greater",
                "2024-01-03T09:00:00+00:00",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                occurrence_record(2, 7, "2024-01-05T09:00:00Z", "2024-01-05T10:00:00Z"),
                occurrence_record(3, 7, "2024-01-08T09:00:00Z", "2024-01-08T10:00:00Z")
            ])))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let occurrences = client
            .occurrences_for_event_after(7, timestamp("2024-01-03T09:00:00Z"))
            .await
            .unwrap();

        assert_eq!(occurrences.len(), 2);
    }

    #[tokio::test]
    async fn test_create_occurrence_returns_assigned_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/table/eventOccurrence"))
            .respond_with(ResponseTemplate::new(201).set_body_json(occurrence_record(
                42,
                7,
                "2024-01-03T09:00:00Z",
                "2024-01-03T10:00:00Z",
            )))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let data = OccurrenceData {
            name: "Standup".to_string(),
            description: String::new(),
            start: timestamp("2024-01-03T09:00:00Z"),
            end: timestamp("2024-01-03T10:00:00Z"),
            color: "#00ff00".to_string(),
        };
        let created = client.create_occurrence(7, &data).await.unwrap();

        assert_eq!(created.id, 42);
        assert_eq!(created.event_id, 7);
    }

    #[tokio::test]
    async fn test_create_occurrence_rejects_invalid_draft() {
        let mock_server = MockServer::start().await;
        let client = PersistenceClient::new(&mock_server.uri());

        let data = OccurrenceData {
            name: "Standup".to_string(),
            description: String::new(),
            start: timestamp("2024-01-03T10:00:00Z"),
            end: timestamp("2024-01-03T09:00:00Z"),
            color: String::new(),
        };
        let result = client.create_occurrence(7, &data).await;
        assert!(matches!(result, Err(CalendarError::Validation(_))));
        // no request must have been issued
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_occurrence() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/table/eventOccurrence/12"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        client.delete_occurrence(12).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_event_round_trips_days_of_week() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/api/table/event/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7,
                "startDate": "2024-01-01T00:00:00Z",
                "endDate": "2024-02-01T00:00:00Z",
                "defaultStartTime": "2024-01-01T09:00:00Z",
                "defaultEndTime": "2024-01-01T10:00:00Z",
                "daysOfWeek": "sMtWtFs",
                "defaultColor": "#ff0000",
                "calendarId": 2
            })))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let event = Event {
            id: 7,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            default_start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            default_end_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            days_of_week: WeekdaySet::parse("sMtWtFs").unwrap(),
            default_color: "#ff0000".to_string(),
            calendar_id: 2,
        };
        let updated = client.update_event(&event).await.unwrap();

        assert_eq!(updated.days_of_week, event.days_of_week);

        let requests = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["daysOfWeek"], "sMtWtFs");
    }

    #[tokio::test]
    async fn test_recalculate_from() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/table/event/7/recalculateFrom/12"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
                occurrence_record(50, 7, "2024-01-05T09:00:00Z", "2024-01-05T10:00:00Z"),
                occurrence_record(51, 7, "2024-01-08T09:00:00Z", "2024-01-08T10:00:00Z")
            ])))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let created = client.recalculate_from(7, 12).await.unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].id, 50);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/table/calendar"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = PersistenceClient::new(&mock_server.uri());
        let result = client.list_calendars().await;

        match result {
            Err(CalendarError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }
    }
}
