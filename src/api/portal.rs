use std::convert::Infallible;

use axum::{Extension, Json};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use bytes::Bytes;
use chrono::Local;
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use ulid::Ulid;

use crate::contacts::{self, ImportError};
use crate::model::{Cents, Contact, Notification, Product, StaffMember};
use crate::revenue::{DateRange, RevenueStats};

use super::{ApiError, AppState, RequestPermit, Tenant, parse_id, parse_json};

const NOTIFICATION_PAGE: usize = 50;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "accounts_loaded": state.tenants.loaded() }))
}

// ── Staff ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewStaff {
    name: String,
    #[serde(default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StaffUpdate {
    name: Option<String>,
    active: Option<bool>,
}

pub async fn list_staff(tenant: Tenant) -> Json<Vec<StaffMember>> {
    Json(tenant.engine.list_staff())
}

pub async fn add_staff(tenant: Tenant, body: Bytes) -> Result<(StatusCode, Json<StaffMember>), ApiError> {
    let request: NewStaff = parse_json(&body)?;
    let staff = tenant
        .engine
        .add_staff(Ulid::new(), request.name, request.active)
        .await?;
    info!(account = %tenant.account.id, staff = %staff.id, name = %staff.name, "staff member added");
    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn update_staff(
    tenant: Tenant,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<StaffMember>, ApiError> {
    let id = parse_id(&id)?;
    let update: StaffUpdate = parse_json(&body)?;
    let staff = tenant.engine.update_staff(id, update.name, update.active).await?;
    info!(account = %tenant.account.id, staff = %id, active = staff.active, "staff member updated");
    Ok(Json(staff))
}

// ── Products ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    name: String,
    /// Cents.
    price: Cents,
}

pub async fn list_products(tenant: Tenant) -> Json<Vec<Product>> {
    Json(tenant.engine.list_products())
}

pub async fn add_product(tenant: Tenant, body: Bytes) -> Result<(StatusCode, Json<Product>), ApiError> {
    let request: NewProduct = parse_json(&body)?;
    let product = tenant
        .engine
        .add_product(Ulid::new(), request.name, request.price)
        .await?;
    info!(account = %tenant.account.id, product = %product.id, price = product.price, "product added");
    Ok((StatusCode::CREATED, Json(product)))
}

// ── Contacts ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    search: Option<String>,
}

pub async fn list_contacts(tenant: Tenant, Query(query): Query<ContactQuery>) -> Json<Value> {
    let (total, contacts): (usize, Vec<Contact>) = tenant.engine.contact_page(query.search.as_deref());
    Json(json!({ "total": total, "contacts": contacts }))
}

/// `POST /contacts/import` with the CSV export as body.
pub async fn import_contacts(tenant: Tenant, body: Bytes) -> Result<Json<Value>, ApiError> {
    let text = std::str::from_utf8(&body)
        .map_err(|e| ApiError::Validation(format!("CSV body is not valid UTF-8: {e}")))?;
    let drafts = contacts::parse_contacts_csv(text).map_err(|e| match e {
        ImportError::NoRows => ApiError::Validation("No valid rows found in CSV".into()),
        other => ApiError::Validation(other.to_string()),
    })?;
    info!(account = %tenant.account.id, rows = drafts.len(), "importing contacts");
    let report = tenant.engine.import_contacts(drafts).await;
    if report.failed > 0 {
        warn!(account = %tenant.account.id, failed = report.failed, "contact import incomplete");
    }
    Ok(Json(json!({
        "success": report.success,
        "failed": report.failed,
        "errors": report.errors,
    })))
}

pub async fn clear_contacts(tenant: Tenant) -> Result<Json<Value>, ApiError> {
    let removed = tenant.engine.clear_contacts().await?;
    info!(account = %tenant.account.id, removed, "contacts cleared");
    Ok(Json(json!({ "success": true, "deleted": removed })))
}

// ── Analytics & notifications ────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    range: Option<String>,
}

pub async fn revenue(tenant: Tenant, Query(query): Query<RevenueQuery>) -> Result<Json<RevenueStats>, ApiError> {
    let range = match query.range.as_deref() {
        Some(raw) => raw.parse::<DateRange>().map_err(ApiError::Validation)?,
        None => DateRange::default(),
    };
    let today = Local::now().date_naive();
    Ok(Json(tenant.engine.revenue(today, range).await))
}

pub async fn notifications(tenant: Tenant) -> Json<Vec<Notification>> {
    Json(tenant.engine.recent_notifications(NOTIFICATION_PAGE))
}

/// Server-sent events: one `notification` event per new notification.
/// Lagging listeners skip what they missed. The stream holds its request
/// permit until the client goes away.
pub async fn events(
    tenant: Tenant,
    Extension(permit): Extension<RequestPermit>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = tenant.engine.notify.subscribe();
    info!(account = %tenant.account.id, "event stream opened");
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let _held = &permit;
        let notification = result.ok()?;
        Event::default()
            .event("notification")
            .id(notification.id.to_string())
            .json_data(&notification)
            .ok()
            .map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
