mod conflict;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use conflict::now_ms;
pub use error::EngineError;
pub use mutations::{AppointmentPatch, NewReservation, ReservationPatch};
pub use queries::AppointmentFilter;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::limits::MAX_NOTIFICATIONS_KEPT;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDay = Arc<RwLock<DayBook>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL. Blocks for the first append, drains whatever else is
/// already queued, then fsyncs once for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after a failed append so stale bytes don't ride along with the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// In-memory state of one account, rebuilt from its WAL on startup.
///
/// Reservations are grouped per calendar day behind their own lock; the
/// conflict check and the insert for a day happen under one write guard.
/// Everything else lives in lock-free maps.
pub struct Engine {
    pub(super) days: DashMap<NaiveDate, SharedDay>,
    /// Reservation id → day it is filed under.
    pub(super) reservation_day: DashMap<Ulid, NaiveDate>,
    pub(super) staff: DashMap<Ulid, StaffMember>,
    pub(super) products: DashMap<Ulid, Product>,
    pub(super) contacts: DashMap<Ulid, Contact>,
    pub(super) appointments: DashMap<Ulid, Appointment>,
    pub(super) notifications: DashMap<Ulid, Notification>,
    /// Serializes multi-event contact writes (import batches, clear).
    pub(super) contacts_lock: Mutex<()>,
    /// Every mutation holds a read guard from before it takes any day lock
    /// until its event is applied. Compaction takes the write side so its
    /// snapshot never misses an event that is already in the old log.
    pub(super) commit_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a reservation event to its day. Caller holds the day's write lock.
fn apply_to_day(day: &mut DayBook, event: &Event, index: &DashMap<Ulid, NaiveDate>) {
    match event {
        Event::ReservationCreated { reservation } => {
            index.insert(reservation.id, reservation.date);
            day.insert(reservation.clone());
        }
        Event::ReservationUpdated {
            id,
            status,
            price_paid,
            product_id,
            ..
        } => {
            if let Some(r) = day.get_mut(*id) {
                r.status = *status;
                r.price_paid = *price_paid;
                r.product_id = *product_id;
            }
        }
        _ => {}
    }
}

/// The day a reservation event belongs to; `None` for account-level events.
fn event_day(event: &Event) -> Option<NaiveDate> {
    match event {
        Event::ReservationCreated { reservation } => Some(reservation.date),
        Event::ReservationUpdated { date, .. } => Some(*date),
        _ => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            reservation_day: DashMap::new(),
            staff: DashMap::new(),
            products: DashMap::new(),
            contacts: DashMap::new(),
            appointments: DashMap::new(),
            notifications: DashMap::new(),
            contacts_lock: Mutex::new(()),
            commit_gate: RwLock::new(()),
            wal_tx,
            notify,
        };

        // Nobody else holds these locks yet, so try_write never fails here.
        // blocking_write would panic when called from inside the runtime.
        for event in &events {
            match event_day(event) {
                Some(date) => {
                    let day = engine.day(date);
                    if let Ok(mut guard) = day.try_write() {
                        apply_to_day(&mut guard, event, &engine.reservation_day);
                    }
                }
                None => engine.apply_to_account(event),
            }
        }

        if !events.is_empty() {
            info!(
                path = %wal_path.display(),
                events = events.len(),
                reservations = engine.reservation_day.len(),
                "replayed WAL"
            );
        }
        Ok(engine)
    }

    /// Apply an account-level event.
    fn apply_to_account(&self, event: &Event) {
        match event {
            Event::StaffAdded { id, name, active } | Event::StaffUpdated { id, name, active } => {
                self.staff.insert(
                    *id,
                    StaffMember {
                        id: *id,
                        name: name.clone(),
                        active: *active,
                    },
                );
            }
            Event::ProductAdded { id, name, price } => {
                self.products.insert(
                    *id,
                    Product {
                        id: *id,
                        name: name.clone(),
                        price: *price,
                    },
                );
            }
            Event::ContactsImported { contacts } => {
                for c in contacts {
                    self.contacts.insert(c.id, c.clone());
                }
            }
            Event::ContactsCleared => self.contacts.clear(),
            Event::AppointmentSaved { appointment } => {
                self.appointments.insert(appointment.id, appointment.clone());
            }
            Event::AppointmentsSynced { appointments } => {
                for a in appointments {
                    self.appointments.insert(a.id, a.clone());
                }
            }
            Event::AppointmentDeleted { id } => {
                self.appointments.remove(id);
            }
            Event::NotificationPosted { notification } => {
                self.notifications.insert(notification.id, notification.clone());
                while self.notifications.len() > MAX_NOTIFICATIONS_KEPT {
                    let Some(oldest) = self.notifications.iter().map(|e| *e.key()).min() else {
                        break;
                    };
                    self.notifications.remove(&oldest);
                }
            }
            Event::ReservationCreated { .. } | Event::ReservationUpdated { .. } => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// The lock for `date`, created empty on first use.
    pub(super) fn day(&self, date: NaiveDate) -> SharedDay {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayBook::new(date))))
            .clone()
    }

    pub(super) fn existing_day(&self, date: NaiveDate) -> Option<SharedDay> {
        self.days.get(&date).map(|e| e.value().clone())
    }

    /// WAL-append then apply, for reservation events. Caller holds the day lock.
    pub(super) async fn persist_to_day(&self, day: &mut DayBook, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_day(day, event, &self.reservation_day);
        Ok(())
    }

    /// WAL-append, apply and broadcast an account-level event.
    pub(super) async fn persist(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_to_account(event);
        if let Event::NotificationPosted { notification } = event {
            self.notify.send(notification);
        }
        Ok(())
    }
}
