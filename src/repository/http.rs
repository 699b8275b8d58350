use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Deserialize;

use super::{RepositoryError, ScheduleRepository, UserId};
use crate::location::{LocationReporter, Position};
use crate::schedule::{Recurrence, ScheduleEntry, ScheduleId, ScheduleKind};

/// Reqwest client against the caretaking backend.
pub struct HttpScheduleService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScheduleService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn map_status(response: &reqwest::Response) -> Result<(), RepositoryError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(RepositoryError::NotFound)
    } else {
        Err(RepositoryError::ServerRejected(status.as_u16()))
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(_: reqwest::Error) -> Self {
        RepositoryError::NetworkUnavailable
    }
}

#[async_trait]
impl ScheduleRepository for HttpScheduleService {
    async fn fetch_today(&self, user_id: UserId) -> Result<Vec<ScheduleEntry>, RepositoryError> {
        let response = self
            .client
            .get(self.url(&format!("schedule/today/{user_id}")))
            .send()
            .await?;
        map_status(&response)?;
        let rows: Vec<ScheduleRow> = response.json().await?;
        Ok(normalize(rows))
    }

    async fn complete_entry(&self, schedule_id: ScheduleId) -> Result<(), RepositoryError> {
        let response = self
            .client
            .put(self.url(&format!("schedule/complete/{schedule_id}")))
            .send()
            .await?;
        map_status(&response)
    }

    async fn delete_entry(&self, user_id: UserId, title: &str) -> Result<(), RepositoryError> {
        let response = self
            .client
            .delete(self.url(&format!("schedule/{user_id}/{title}")))
            .send()
            .await?;
        map_status(&response)
    }
}

#[async_trait]
impl LocationReporter for HttpScheduleService {
    async fn report_position(
        &self,
        user_id: UserId,
        position: &Position,
    ) -> Result<(), RepositoryError> {
        let body = serde_json::json!({
            "latitude": position.latitude,
            "longitude": position.longitude,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "protectedUserId": user_id,
        });
        let response = self.client.post(self.url("location")).json(&body).send().await?;
        map_status(&response)
    }
}

/// One schedule row as the backend serves it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRow {
    id: Option<ScheduleId>,
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    is_recurring: bool,
    recurring_time: Option<String>,
    one_time_date_time: Option<String>,
    #[serde(default)]
    completed: bool,
}

/// Rows with an unparseable time are dropped with a warning instead of
/// failing the whole fetch.
fn normalize(rows: Vec<ScheduleRow>) -> Vec<ScheduleEntry> {
    rows.into_iter()
        .filter_map(|row| match entry_from_row(row) {
            Ok(entry) => Some(entry),
            Err(row) => {
                log::warn!(
                    "Skipping schedule row with malformed time. [title = {}]",
                    row.title
                );
                None
            }
        })
        .collect()
}

fn entry_from_row(row: ScheduleRow) -> Result<ScheduleEntry, ScheduleRow> {
    let recurrence = if row.is_recurring {
        match row.recurring_time.as_deref().and_then(parse_time_of_day) {
            Some(time_of_day) => Recurrence::daily(time_of_day),
            None => return Err(row),
        }
    } else {
        match row.one_time_date_time.as_deref().and_then(parse_date_time) {
            Some(at) => Recurrence::OneTime { at },
            None => return Err(row),
        }
    };

    Ok(ScheduleEntry {
        id: row.id,
        title: row.title,
        kind: parse_kind(&row.kind),
        recurrence,
        completed: row.completed,
    })
}

fn parse_kind(raw: &str) -> ScheduleKind {
    match raw {
        "HOSPITAL" | "APPOINTMENT" => ScheduleKind::Appointment,
        // The backend has served both spellings for medication entries.
        _ => ScheduleKind::Medication,
    }
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}
