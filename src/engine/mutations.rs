use std::collections::HashSet;

use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::contacts::{ContactDraft, ImportReport};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::schedule::SchedulePolicy;

use super::conflict::{check_no_conflict, now_ms, validate_customer, validate_party_size};
use super::{Engine, EngineError, WalCommand};

/// A booking request that has passed input parsing and staff resolution.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub start: Minute,
    /// Stored end. The conflict check always uses the policy's slot length.
    pub end: Option<Minute>,
    pub customer: Customer,
    pub party_size: u32,
    pub notes: Option<String>,
    pub source: String,
    pub staff_member_id: Option<Ulid>,
}

/// Portal edit of a booking. Outer `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub status: Option<ReservationStatus>,
    pub price_paid: Option<Option<Cents>>,
    pub product_id: Option<Option<Ulid>>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub metadata: Option<String>,
}

fn validate_name(name: &str, what: &'static str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Invalid(what));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_appointment(appointment: &Appointment) -> Result<(), EngineError> {
    validate_name(&appointment.title, "appointment title is empty")?;
    if appointment.end < appointment.start {
        return Err(EngineError::Invalid("appointment ends before it starts"));
    }
    if appointment
        .description
        .as_ref()
        .is_some_and(|d| d.len() > MAX_NOTES_LEN)
        || appointment.metadata.len() > MAX_NOTES_LEN
    {
        return Err(EngineError::LimitExceeded("appointment text too long"));
    }
    Ok(())
}

impl Engine {
    // ── Reservations ─────────────────────────────────────────

    /// Check the requested slot and insert the booking under one day lock.
    /// Two requests for the same slot are serialized; the second sees the
    /// first and gets `SlotOccupied`.
    pub async fn create_reservation(
        &self,
        id: Ulid,
        request: NewReservation,
        policy: &SchedulePolicy,
    ) -> Result<Reservation, EngineError> {
        validate_customer(&request.customer)?;
        let party_size = validate_party_size(request.party_size)?;
        if request.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
        if let Some(staff_id) = request.staff_member_id
            && !self.staff.contains_key(&staff_id)
        {
            return Err(EngineError::NotFound(staff_id));
        }
        if self.reservation_day.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        // The request always claims a full slot; an explicit end is only stored.
        let requested = policy.slot_at(request.start);
        let span = policy.booking_span(request.start, request.end);

        let _gate = self.commit_gate.read().await;
        let day = self.day(request.date);
        let mut guard = day.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations on this day"));
        }

        if let Err(e) = check_no_conflict(&guard, requested, request.staff_member_id, policy) {
            if let EngineError::SlotOccupied { alternatives } = &e {
                metrics::counter!(observability::SLOT_CONFLICTS_TOTAL).increment(1);
                metrics::histogram!(observability::ALTERNATIVES_OFFERED)
                    .record(alternatives.len() as f64);
                debug!(
                    date = %request.date,
                    start = %format_time_of_day(requested.start),
                    alternatives = alternatives.len(),
                    "slot occupied"
                );
            }
            return Err(e);
        }

        let reservation = Reservation {
            id,
            date: request.date,
            span,
            customer: request.customer,
            party_size,
            notes: request.notes,
            source: request.source,
            status: ReservationStatus::Pending,
            staff_member_id: request.staff_member_id,
            price_paid: None,
            product_id: None,
            created_at: now_ms(),
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.persist_to_day(&mut guard, &event).await?;
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        Ok(reservation)
    }

    /// Change status or pricing. Reviving a cancelled booking re-checks its slot.
    pub async fn update_reservation(
        &self,
        id: Ulid,
        patch: ReservationPatch,
        policy: &SchedulePolicy,
    ) -> Result<Reservation, EngineError> {
        if let Some(Some(price)) = patch.price_paid
            && price < 0
        {
            return Err(EngineError::Invalid("price must not be negative"));
        }
        if let Some(Some(product_id)) = patch.product_id
            && !self.products.contains_key(&product_id)
        {
            return Err(EngineError::NotFound(product_id));
        }

        let _gate = self.commit_gate.read().await;
        let date = self
            .reservation_day
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(id))?;
        let day = self.existing_day(date).ok_or(EngineError::NotFound(id))?;
        let mut guard = day.write().await;
        let current = guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        let status = patch.status.unwrap_or(current.status);
        if !current.status.blocks_slot() && status.blocks_slot() {
            check_no_conflict(&guard, current.span, current.staff_member_id, policy)?;
        }

        let event = Event::ReservationUpdated {
            id,
            date,
            status,
            price_paid: patch.price_paid.unwrap_or(current.price_paid),
            product_id: patch.product_id.unwrap_or(current.product_id),
        };
        self.persist_to_day(&mut guard, &event).await?;
        guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    // ── Staff & products ─────────────────────────────────────

    pub async fn add_staff(&self, id: Ulid, name: String, active: bool) -> Result<StaffMember, EngineError> {
        validate_name(&name, "staff name is empty")?;
        if self.staff.len() >= MAX_STAFF_PER_ACCOUNT {
            return Err(EngineError::LimitExceeded("too many staff members"));
        }
        if self.staff.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let _gate = self.commit_gate.read().await;
        let name = name.trim().to_string();
        self.persist(&Event::StaffAdded {
            id,
            name: name.clone(),
            active,
        })
        .await?;
        Ok(StaffMember { id, name, active })
    }

    pub async fn update_staff(
        &self,
        id: Ulid,
        name: Option<String>,
        active: Option<bool>,
    ) -> Result<StaffMember, EngineError> {
        let current = self
            .staff
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        if let Some(ref n) = name {
            validate_name(n, "staff name is empty")?;
        }
        let updated = StaffMember {
            id,
            name: name.map(|n| n.trim().to_string()).unwrap_or(current.name),
            active: active.unwrap_or(current.active),
        };
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::StaffUpdated {
            id,
            name: updated.name.clone(),
            active: updated.active,
        })
        .await?;
        Ok(updated)
    }

    pub async fn add_product(&self, id: Ulid, name: String, price: Cents) -> Result<Product, EngineError> {
        validate_name(&name, "product name is empty")?;
        if price < 0 {
            return Err(EngineError::Invalid("price must not be negative"));
        }
        if self.products.len() >= MAX_PRODUCTS_PER_ACCOUNT {
            return Err(EngineError::LimitExceeded("too many products"));
        }
        if self.products.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let _gate = self.commit_gate.read().await;
        let name = name.trim().to_string();
        self.persist(&Event::ProductAdded {
            id,
            name: name.clone(),
            price,
        })
        .await?;
        Ok(Product { id, name, price })
    }

    // ── Contacts ─────────────────────────────────────────────

    /// Store parsed rows in batches of `IMPORT_BATCH_SIZE`. A failing batch
    /// is counted and reported; later batches still run.
    pub async fn import_contacts(&self, drafts: Vec<ContactDraft>) -> ImportReport {
        let _serial = self.contacts_lock.lock().await;
        let mut report = ImportReport::default();
        let mut drafts = drafts.into_iter().peekable();
        let mut batch_no = 0usize;

        while drafts.peek().is_some() {
            batch_no += 1;
            let batch: Vec<ContactDraft> = drafts.by_ref().take(IMPORT_BATCH_SIZE).collect();
            let size = batch.len();
            match self.store_contact_batch(batch).await {
                Ok(()) => report.success += size,
                Err(e) => {
                    warn!(batch = batch_no, "contact batch rejected: {e}");
                    report.failed += size;
                    report.errors.push(format!("Batch {batch_no}: {e}"));
                }
            }
        }

        metrics::counter!(observability::CONTACTS_IMPORTED_TOTAL).increment(report.success as u64);
        info!(success = report.success, failed = report.failed, "contacts imported");
        report
    }

    async fn store_contact_batch(&self, batch: Vec<ContactDraft>) -> Result<(), EngineError> {
        if self.contacts.len() + batch.len() > MAX_CONTACTS_PER_ACCOUNT {
            return Err(EngineError::LimitExceeded("too many contacts"));
        }
        for draft in &batch {
            let fields = [&draft.phone, &draft.email, &draft.first_name, &draft.last_name];
            if draft.name.len() > MAX_NAME_LEN
                || fields.iter().any(|f| f.as_ref().is_some_and(|v| v.len() > MAX_NAME_LEN))
            {
                return Err(EngineError::LimitExceeded("contact field too long"));
            }
            if draft.info.as_ref().is_some_and(|i| i.len() > MAX_NOTES_LEN) {
                return Err(EngineError::LimitExceeded("contact info too long"));
            }
        }
        let now = now_ms();
        let contacts = batch
            .into_iter()
            .map(|d| d.into_contact(Ulid::new(), now))
            .collect();
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::ContactsImported { contacts }).await
    }

    /// Remove every contact. Returns how many were removed.
    pub async fn clear_contacts(&self) -> Result<usize, EngineError> {
        let _serial = self.contacts_lock.lock().await;
        let removed = self.contacts.len();
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::ContactsCleared).await?;
        Ok(removed)
    }

    // ── Appointments ─────────────────────────────────────────

    /// Insert or replace by id.
    pub async fn save_appointment(&self, appointment: Appointment) -> Result<Appointment, EngineError> {
        validate_appointment(&appointment)?;
        if !self.appointments.contains_key(&appointment.id)
            && self.appointments.len() >= MAX_APPOINTMENTS_PER_ACCOUNT
        {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::AppointmentSaved {
            appointment: appointment.clone(),
        })
        .await?;
        Ok(appointment)
    }

    pub async fn update_appointment(&self, id: Ulid, patch: AppointmentPatch) -> Result<Appointment, EngineError> {
        let mut appointment = self
            .appointments
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        if let Some(title) = patch.title {
            appointment.title = title;
        }
        if let Some(description) = patch.description {
            appointment.description = Some(description);
        }
        if let Some(start) = patch.start {
            appointment.start = start;
        }
        if let Some(end) = patch.end {
            appointment.end = end;
        }
        if let Some(location) = patch.location {
            appointment.location = Some(location);
        }
        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(metadata) = patch.metadata {
            appointment.metadata = metadata;
        }
        self.save_appointment(appointment).await
    }

    pub async fn delete_appointment(&self, id: Ulid) -> Result<Appointment, EngineError> {
        let existing = self
            .appointments
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::AppointmentDeleted { id }).await?;
        Ok(existing)
    }

    /// Upsert a batch from the workflow tool. Every entry is validated
    /// first; the batch is written as one record or not at all.
    pub async fn sync_appointments(&self, appointments: Vec<Appointment>) -> Result<usize, EngineError> {
        if appointments.len() > MAX_SYNC_BATCH {
            return Err(EngineError::LimitExceeded("sync batch too large"));
        }
        for appointment in &appointments {
            validate_appointment(appointment)?;
        }
        let added: HashSet<Ulid> = appointments
            .iter()
            .map(|a| a.id)
            .filter(|id| !self.appointments.contains_key(id))
            .collect();
        if self.appointments.len() + added.len() > MAX_APPOINTMENTS_PER_ACCOUNT {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }
        if appointments.is_empty() {
            return Ok(0);
        }

        let synced = appointments.len();
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::AppointmentsSynced { appointments }).await?;
        Ok(synced)
    }

    // ── Notifications ────────────────────────────────────────

    pub async fn post_notification(
        &self,
        title: &str,
        message: String,
        link: &str,
    ) -> Result<Notification, EngineError> {
        let notification = Notification {
            id: Ulid::new(),
            title: title.to_string(),
            message,
            kind: "info".to_string(),
            link: link.to_string(),
            created_at: now_ms(),
        };
        let _gate = self.commit_gate.read().await;
        self.persist(&Event::NotificationPosted {
            notification: notification.clone(),
        })
        .await?;
        Ok(notification)
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL as the minimal event list that rebuilds current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let mut events = Vec::new();

        for entry in self.staff.iter() {
            let s = entry.value();
            events.push(Event::StaffAdded {
                id: s.id,
                name: s.name.clone(),
                active: s.active,
            });
        }
        for entry in self.products.iter() {
            let p = entry.value();
            events.push(Event::ProductAdded {
                id: p.id,
                name: p.name.clone(),
                price: p.price,
            });
        }

        let days: Vec<_> = self.days.iter().map(|e| e.value().clone()).collect();
        for day in days {
            let guard = day.read().await;
            for reservation in &guard.reservations {
                events.push(Event::ReservationCreated {
                    reservation: reservation.clone(),
                });
            }
        }

        let contacts: Vec<Contact> = self.contacts.iter().map(|e| e.value().clone()).collect();
        for chunk in contacts.chunks(IMPORT_BATCH_SIZE * 10) {
            events.push(Event::ContactsImported {
                contacts: chunk.to_vec(),
            });
        }
        for entry in self.appointments.iter() {
            events.push(Event::AppointmentSaved {
                appointment: entry.value().clone(),
            });
        }
        let mut notifications: Vec<Notification> =
            self.notifications.iter().map(|e| e.value().clone()).collect();
        notifications.sort_by_key(|n| n.id);
        events.extend(
            notifications
                .into_iter()
                .map(|notification| Event::NotificationPosted { notification }),
        );

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
