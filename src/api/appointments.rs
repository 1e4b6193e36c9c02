use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use ulid::Ulid;

use crate::auth::{self, AuthError};
use crate::engine::{AppointmentFilter, AppointmentPatch, Engine};
use crate::model::{Appointment, Ms};
use crate::revenue::local_day_bounds;

use super::{ApiError, AppState, parse_id, parse_json};

#[derive(Debug, Deserialize)]
struct AppointmentRequest {
    action: Option<String>,
    user_id: Option<String>,
    appointment_id: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    filters: Option<Filters>,
}

#[derive(Debug, Default, Deserialize)]
struct AppointmentData {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    status: Option<String>,
    metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    status: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
}

enum Action {
    Create,
    Update,
    Delete,
    List,
    Sync,
}

impl Action {
    fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.unwrap_or("") {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "list" => Ok(Action::List),
            "sync" => Ok(Action::Sync),
            other => Err(ApiError::Validation(format!("Unknown action: {other}"))),
        }
    }
}

/// Wire shape of an appointment: RFC 3339 instants and metadata as JSON.
#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub id: Ulid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub status: String,
    pub metadata: Value,
}

impl From<Appointment> for AppointmentView {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            title: a.title,
            description: a.description,
            start_time: format_instant(a.start),
            end_time: format_instant(a.end),
            location: a.location,
            status: a.status,
            metadata: serde_json::from_str(&a.metadata).unwrap_or(Value::String(a.metadata)),
        }
    }
}

fn format_instant(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn parse_instant(field: &str, raw: &str) -> Result<Ms, ApiError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.timestamp_millis())
        .map_err(|_| ApiError::Validation(format!("Invalid {field}: {raw}")))
}

/// Filter bounds accept a full instant or a bare date (local midnight).
fn parse_bound(field: &str, raw: &str) -> Result<Ms, ApiError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        return Ok(local_day_bounds(day).0);
    }
    parse_instant(field, raw)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn metadata_text(metadata: Option<Value>) -> Option<String> {
    metadata.filter(|m| !m.is_null()).map(|m| m.to_string())
}

impl AppointmentData {
    fn from_value(value: Value) -> Result<Self, ApiError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| ApiError::Validation(format!("Invalid appointment data: {e}")))
    }

    fn into_patch(self) -> Result<AppointmentPatch, ApiError> {
        Ok(AppointmentPatch {
            title: non_empty(self.title),
            description: self.description,
            start: match non_empty(self.start_time) {
                Some(raw) => Some(parse_instant("start_time", &raw)?),
                None => None,
            },
            end: match non_empty(self.end_time) {
                Some(raw) => Some(parse_instant("end_time", &raw)?),
                None => None,
            },
            location: self.location,
            status: non_empty(self.status),
            metadata: metadata_text(self.metadata),
        })
    }

    /// A complete new appointment; `None` when a required field is missing.
    fn into_new(self, id: Ulid) -> Result<Option<Appointment>, ApiError> {
        let (Some(title), Some(start), Some(end)) = (
            non_empty(self.title),
            non_empty(self.start_time),
            non_empty(self.end_time),
        ) else {
            return Ok(None);
        };
        Ok(Some(Appointment {
            id,
            title,
            description: self.description,
            start: parse_instant("start_time", &start)?,
            end: parse_instant("end_time", &end)?,
            location: self.location,
            status: non_empty(self.status).unwrap_or_else(|| "pending".to_string()),
            metadata: metadata_text(self.metadata).unwrap_or_else(|| "{}".to_string()),
        }))
    }
}

/// `POST /webhooks/appointments`: calendar management driven by the
/// workflow tool, authenticated with the shared `x-n8n-signature` secret.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers.get("x-n8n-signature").and_then(|v| v.to_str().ok());
    auth::verify_workflow_signature(state.webhook_secret.as_deref(), signature)?;

    let request: AppointmentRequest = parse_json(&body)?;
    debug!(action = ?request.action, user = ?request.user_id, "appointments webhook");
    let action = Action::parse(request.action.as_deref())?;

    let Some(user_id) = non_empty(request.user_id) else {
        return Err(ApiError::Validation(match action {
            Action::Create => "Missing required fields: user_id, title, start_time, end_time".into(),
            _ => "Missing user_id".into(),
        }));
    };
    let account = state
        .credentials
        .account_by_id(user_id.trim())
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Unknown user_id: {user_id}")))?;
    if !account.is_active() {
        return Err(AuthError::AccountInactive.into());
    }
    let engine = state.engine_for(&account)?;

    match action {
        Action::Create => {
            let data = AppointmentData::from_value(request.data)?;
            let appointment = data.into_new(Ulid::new())?.ok_or_else(|| {
                ApiError::Validation("Missing required fields: user_id, title, start_time, end_time".into())
            })?;
            let appointment = engine.save_appointment(appointment).await?;
            info!(account = %account.id, appointment = %appointment.id, "appointment created");
            Ok(Json(json!({ "success": true, "appointment": AppointmentView::from(appointment) })))
        }
        Action::Update => {
            let id = required_id(request.appointment_id)?;
            let patch = AppointmentData::from_value(request.data)?.into_patch()?;
            let appointment = engine.update_appointment(id, patch).await?;
            info!(account = %account.id, appointment = %id, "appointment updated");
            Ok(Json(json!({ "success": true, "appointment": AppointmentView::from(appointment) })))
        }
        Action::Delete => {
            let id = required_id(request.appointment_id)?;
            engine.delete_appointment(id).await?;
            info!(account = %account.id, appointment = %id, "appointment deleted");
            Ok(Json(json!({ "success": true, "deleted": id })))
        }
        Action::List => {
            let filters = request.filters.unwrap_or_default();
            let filter = AppointmentFilter {
                status: non_empty(filters.status),
                from: match non_empty(filters.from_date) {
                    Some(raw) => Some(parse_bound("from_date", &raw)?),
                    None => None,
                },
                to: match non_empty(filters.to_date) {
                    Some(raw) => Some(parse_bound("to_date", &raw)?),
                    None => None,
                },
            };
            let appointments: Vec<AppointmentView> = engine
                .list_appointments(&filter)
                .into_iter()
                .map(AppointmentView::from)
                .collect();
            info!(account = %account.id, count = appointments.len(), "appointments listed");
            Ok(Json(json!({
                "success": true,
                "count": appointments.len(),
                "appointments": appointments,
            })))
        }
        Action::Sync => {
            let Value::Array(entries) = request.data else {
                return Err(ApiError::Validation(
                    "Sync action expects data to be an array of appointments".into(),
                ));
            };
            let mut batch = Vec::with_capacity(entries.len());
            for entry in entries {
                batch.push(sync_entry(&engine, entry)?);
            }
            let synced = engine.sync_appointments(batch).await?;
            info!(account = %account.id, synced, "appointments synced");
            Ok(Json(json!({ "success": true, "synced": synced })))
        }
    }
}

fn required_id(raw: Option<String>) -> Result<Ulid, ApiError> {
    match non_empty(raw) {
        Some(raw) => parse_id(&raw),
        None => Err(ApiError::Validation("Missing appointment_id".into())),
    }
}

/// Merge onto the stored appointment with the same id, or build a new one.
fn sync_entry(engine: &Engine, entry: Value) -> Result<Appointment, ApiError> {
    let data = AppointmentData::from_value(entry)?;
    let id = match non_empty(data.id.clone()) {
        Some(raw) => parse_id(&raw)?,
        None => Ulid::new(),
    };
    let Some(mut existing) = engine.get_appointment(&id) else {
        return data.into_new(id)?.ok_or_else(|| {
            ApiError::Validation(format!("Appointment {id} needs title, start_time and end_time"))
        });
    };

    let patch = data.into_patch()?;
    if let Some(title) = patch.title {
        existing.title = title;
    }
    if let Some(description) = patch.description {
        existing.description = Some(description);
    }
    if let Some(start) = patch.start {
        existing.start = start;
    }
    if let Some(end) = patch.end {
        existing.end = end;
    }
    if let Some(location) = patch.location {
        existing.location = Some(location);
    }
    if let Some(status) = patch.status {
        existing.status = status;
    }
    if let Some(metadata) = patch.metadata {
        existing.metadata = metadata;
    }
    Ok(existing)
}
