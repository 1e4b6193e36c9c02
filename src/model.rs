use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds: creation stamps and appointment instants.
pub type Ms = i64;

/// Minutes since local midnight. Spans crossing midnight run past 1440.
pub type Minute = i32;

/// Money in integer cents.
pub type Cents = i64;

pub const MINUTES_PER_DAY: Minute = 24 * 60;

/// Half-open interval `[start, end)` on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) into minutes since midnight.
pub fn parse_time_of_day(s: &str) -> Option<Minute> {
    let s = s.trim();
    let t = NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()?;
    Some((t.hour() * 60 + t.minute()) as Minute)
}

/// Format minutes as `HH:MM`, wrapping past midnight.
pub fn format_time_of_day(m: Minute) -> String {
    let m = m.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Accepts `YYYY-MM-DD` and `DD.MM.YYYY` (day and month may be one digit).
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.contains('.') {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let day: u32 = parts[0].trim().parse().ok()?;
        let month: u32 = parts[1].trim().parse().ok()?;
        let year: i32 = parts[2].trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled bookings never block a slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }

    pub fn earns_revenue(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed | ReservationStatus::Completed)
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Ulid,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Ulid,
    pub name: String,
    pub price: Cents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Customer {
    /// Identity used for distinct-customer counts: phone, else email.
    pub fn key(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub date: NaiveDate,
    pub span: Span,
    pub customer: Customer,
    pub party_size: u32,
    pub notes: Option<String>,
    pub source: String,
    pub status: ReservationStatus,
    pub staff_member_id: Option<Ulid>,
    pub price_paid: Option<Cents>,
    pub product_id: Option<Ulid>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Ulid,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub info: Option<String>,
    pub consent_status: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub booking_count: u32,
    pub original_created_at: Option<String>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub title: String,
    pub description: Option<String>,
    pub start: Ms,
    pub end: Ms,
    pub location: Option<String>,
    pub status: String,
    /// Raw JSON object text; bincode cannot carry `serde_json::Value`.
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Ulid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: String,
    pub created_at: Ms,
}

/// All reservations of one account on one calendar day, sorted by `span.start`.
#[derive(Debug, Clone)]
pub struct DayBook {
    pub date: NaiveDate,
    pub reservations: Vec<Reservation>,
}

impl DayBook {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Reservations whose span overlaps the query window.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    /// Spans that block new bookings: not cancelled, and assigned to `staff`
    /// when a staff member is given.
    pub fn blocking_spans(&self, staff: Option<Ulid>) -> Vec<Span> {
        self.reservations
            .iter()
            .filter(|r| r.status.blocks_slot())
            .filter(|r| staff.is_none() || r.staff_member_id == staff)
            .map(|r| r.span)
            .collect()
    }
}

/// The WAL record format. One enum, flat payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StaffAdded {
        id: Ulid,
        name: String,
        active: bool,
    },
    StaffUpdated {
        id: Ulid,
        name: String,
        active: bool,
    },
    ProductAdded {
        id: Ulid,
        name: String,
        price: Cents,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationUpdated {
        id: Ulid,
        date: NaiveDate,
        status: ReservationStatus,
        price_paid: Option<Cents>,
        product_id: Option<Ulid>,
    },
    ContactsImported {
        contacts: Vec<Contact>,
    },
    ContactsCleared,
    AppointmentSaved {
        appointment: Appointment,
    },
    AppointmentDeleted {
        id: Ulid,
    },
    NotificationPosted {
        notification: Notification,
    },
    /// A whole sync batch, applied as one record.
    AppointmentsSynced {
        appointments: Vec<Appointment>,
    },
}
