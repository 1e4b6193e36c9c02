use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::{EngineError, NewReservation, ReservationPatch};
use crate::model::*;
use crate::schedule;

use super::{ApiError, AppState, Tenant, lenient_u32, nullable, parse_id, parse_json};

/// Body sent by the workflow tool. Everything is optional at this stage so
/// missing fields produce our own validation message.
#[derive(Debug, Default, Deserialize)]
pub struct ReservationPayload {
    pub customer_name: Option<String>,
    pub reservation_date: Option<String>,
    pub reservation_time: Option<String>,
    pub end_time: Option<String>,
    pub staff_member_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub party_size: Option<u32>,
    pub notes: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub source: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn owned(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: Ulid,
    pub reservation_date: String,
    pub reservation_time: String,
    pub end_time: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub party_size: u32,
    pub notes: Option<String>,
    pub source: String,
    pub status: ReservationStatus,
    pub staff_member_id: Option<Ulid>,
    pub price_paid: Option<Cents>,
    pub product_id: Option<Ulid>,
    pub created_at: Ms,
}

impl From<Reservation> for ReservationView {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            reservation_date: r.date.format("%Y-%m-%d").to_string(),
            reservation_time: format_time_of_day(r.span.start),
            end_time: format_time_of_day(r.span.end),
            customer_name: r.customer.name,
            customer_phone: r.customer.phone,
            customer_email: r.customer.email,
            party_size: r.party_size,
            notes: r.notes,
            source: r.source,
            status: r.status,
            staff_member_id: r.staff_member_id,
            price_paid: r.price_paid,
            product_id: r.product_id,
            created_at: r.created_at,
        }
    }
}

/// `POST /webhooks/reservations`
pub async fn webhook(
    State(state): State<AppState>,
    tenant: Tenant,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Tenant { account, engine } = tenant;
    let payload: ReservationPayload = parse_json(&body)?;
    debug!(account = %account.id, ?payload, "reservation webhook");

    let (Some(customer_name), Some(raw_date), Some(raw_time)) = (
        present(&payload.customer_name),
        present(&payload.reservation_date),
        present(&payload.reservation_time),
    ) else {
        return Err(ApiError::Validation(
            "Missing required fields: customer_name, reservation_date, reservation_time".into(),
        ));
    };
    let date = parse_calendar_date(raw_date)
        .ok_or_else(|| ApiError::Validation(format!("Invalid reservation_date: {raw_date}")))?;
    let start = parse_time_of_day(raw_time)
        .ok_or_else(|| ApiError::Validation(format!("Invalid reservation_time: {raw_time}")))?;
    let end = match present(&payload.end_time) {
        Some(raw) => Some(
            parse_time_of_day(raw)
                .ok_or_else(|| ApiError::Validation(format!("Invalid end_time: {raw}")))?,
        ),
        None => None,
    };

    let staff = match present(&payload.staff_member_name) {
        Some(name) => {
            let active = engine.active_staff();
            let found = schedule::resolve_staff(name, &active).cloned();
            match &found {
                Some(s) => info!(account = %account.id, staff = %s.name, "staff member resolved"),
                None => {
                    let available: Vec<&str> = active.iter().map(|s| s.name.as_str()).collect();
                    info!(
                        account = %account.id,
                        requested = name,
                        available = %available.join(", "),
                        "no matching staff member, booking unassigned"
                    );
                }
            }
            found
        }
        None => None,
    };

    let party_size = payload.party_size.filter(|p| *p > 0).unwrap_or(2);
    let request = NewReservation {
        date,
        start,
        end,
        customer: Customer {
            name: customer_name.to_string(),
            phone: owned(payload.customer_phone.clone()),
            email: owned(payload.customer_email.clone()),
        },
        party_size,
        notes: owned(payload.notes.clone()),
        source: present(&payload.source).unwrap_or("n8n").to_string(),
        staff_member_id: staff.as_ref().map(|s| s.id),
    };
    let staff_name = staff.as_ref().map(|s| s.name.clone());

    match engine.create_reservation(Ulid::new(), request, &state.policy).await {
        Ok(reservation) => {
            info!(
                account = %account.id,
                reservation = %reservation.id,
                date = %reservation.date,
                time = raw_time,
                staff = staff_name.as_deref().unwrap_or("-"),
                "reservation created"
            );

            let message = match &staff_name {
                Some(s) => format!(
                    "{customer_name} hat eine Reservierung für {party_size} Personen am {raw_date} um {raw_time} Uhr bei {s} angefragt."
                ),
                None => format!(
                    "{customer_name} hat eine Reservierung für {party_size} Personen am {raw_date} um {raw_time} Uhr angefragt."
                ),
            };
            if let Err(e) = engine
                .post_notification("Neue Reservierung", message, "/portal/reservations")
                .await
            {
                warn!(account = %account.id, "could not store notification: {e}");
            }

            let confirmation = match &staff_name {
                Some(s) => format!("Reservierung erfolgreich erstellt und {s} zugewiesen"),
                None => "Reservierung erfolgreich erstellt".to_string(),
            };
            let body = json!({
                "success": true,
                "reservation_id": reservation.id,
                "message": confirmation,
                "reservation_date": raw_date,
                "reservation_time": raw_time,
                "end_time": format_time_of_day(state.policy.slot_at(reservation.span.start).end),
                "staff_member_id": reservation.staff_member_id,
                "staff_member_name": staff_name,
            });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        Err(EngineError::SlotOccupied { alternatives }) => {
            info!(
                account = %account.id,
                date = %date,
                time = raw_time,
                alternatives = alternatives.len(),
                "time slot occupied"
            );
            let slots: Vec<String> = alternatives.iter().map(|m| format_time_of_day(*m)).collect();
            let message = match &staff_name {
                Some(s) => format!("{s} hat um {raw_time} Uhr am {raw_date} bereits einen Termin."),
                None => format!("Der Termin um {raw_time} Uhr am {raw_date} ist bereits belegt."),
            };
            let alternative_message = if slots.is_empty() {
                "An diesem Tag sind leider keine Termine mehr frei.".to_string()
            } else {
                let listed: Vec<String> = slots.iter().map(|s| format!("{s} Uhr")).collect();
                match &staff_name {
                    Some(s) => format!("Verfügbare Zeiten für {s}: {}", listed.join(", ")),
                    None => format!("Verfügbare Zeiten: {}", listed.join(", ")),
                }
            };
            let body = json!({
                "success": false,
                "error": "TIME_SLOT_OCCUPIED",
                "message": message,
                "staff_member": staff_name,
                "alternative_slots": slots,
                "alternative_message": alternative_message,
            });
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
}

/// `GET /reservations?date=`: one day, or everything when no date is given.
pub async fn list(tenant: Tenant, Query(query): Query<ListQuery>) -> Result<Json<Vec<ReservationView>>, ApiError> {
    let reservations = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => {
            let date = parse_calendar_date(raw)
                .ok_or_else(|| ApiError::Validation(format!("Invalid date: {raw}")))?;
            tenant.engine.reservations_on(date).await
        }
        None => tenant.engine.all_reservations().await,
    };
    Ok(Json(reservations.into_iter().map(ReservationView::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationUpdate {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub price_paid: Option<Option<Cents>>,
    #[serde(default, deserialize_with = "nullable")]
    pub product_id: Option<Option<Ulid>>,
}

/// `PATCH /reservations/{id}`
pub async fn update(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReservationView>, ApiError> {
    let id = parse_id(&id)?;
    let update: ReservationUpdate = parse_json(&body)?;
    let status = match update.status.as_deref() {
        Some(raw) => Some(raw.parse::<ReservationStatus>().map_err(ApiError::Validation)?),
        None => None,
    };
    let patch = ReservationPatch {
        status,
        price_paid: update.price_paid,
        product_id: update.product_id,
    };
    let reservation = tenant.engine.update_reservation(id, patch, &state.policy).await?;
    info!(
        account = %tenant.account.id,
        reservation = %id,
        status = reservation.status.as_str(),
        "reservation updated"
    );
    Ok(Json(reservation.into()))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub staff_member_name: Option<String>,
}

/// `GET /availability?date=&staff_member_name=`: unbooked windows inside
/// business hours.
pub async fn availability(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_calendar_date(&query.date)
        .ok_or_else(|| ApiError::Validation(format!("Invalid date: {}", query.date)))?;
    let staff = match present(&query.staff_member_name) {
        Some(name) => {
            let active = tenant.engine.active_staff();
            let found = schedule::resolve_staff(name, &active).cloned();
            if found.is_none() {
                return Err(ApiError::NotFound(format!("No active staff member matches {name}")));
            }
            found
        }
        None => None,
    };

    let windows = tenant
        .engine
        .free_windows(date, staff.as_ref().map(|s| s.id), &state.policy)
        .await;
    let free: Vec<_> = windows
        .iter()
        .map(|w| json!({ "start": format_time_of_day(w.start), "end": format_time_of_day(w.end) }))
        .collect();

    Ok(Json(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "staff_member_id": staff.as_ref().map(|s| s.id),
        "staff_member_name": staff.as_ref().map(|s| s.name.clone()),
        "free": free,
    })))
}
