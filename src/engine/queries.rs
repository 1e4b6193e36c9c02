use std::collections::HashMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::CONTACT_PAGE_SIZE;
use crate::model::*;
use crate::revenue::{self, ContactCounts, DateRange, RevenueStats};
use crate::schedule::{self, SchedulePolicy};

use super::Engine;

/// Optional filters of the appointment listing, applied to the start instant.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<String>,
    pub from: Option<Ms>,
    pub to: Option<Ms>,
}

impl AppointmentFilter {
    fn matches(&self, a: &Appointment) -> bool {
        self.status.as_ref().is_none_or(|s| &a.status == s)
            && self.from.is_none_or(|from| a.start >= from)
            && self.to.is_none_or(|to| a.start <= to)
    }
}

impl Engine {
    pub fn list_staff(&self) -> Vec<StaffMember> {
        let mut staff: Vec<StaffMember> = self.staff.iter().map(|e| e.value().clone()).collect();
        staff.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        staff
    }

    pub fn active_staff(&self) -> Vec<StaffMember> {
        let mut staff = self.list_staff();
        staff.retain(|s| s.active);
        staff
    }

    pub fn get_staff(&self, id: &Ulid) -> Option<StaffMember> {
        self.staff.get(id).map(|e| e.value().clone())
    }

    pub fn list_products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.iter().map(|e| e.value().clone()).collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        products
    }

    pub fn price_table(&self) -> HashMap<Ulid, Cents> {
        self.products.iter().map(|e| (*e.key(), e.value().price)).collect()
    }

    /// Bookings of one day in start order, cancelled ones included.
    pub async fn reservations_on(&self, date: NaiveDate) -> Vec<Reservation> {
        match self.existing_day(date) {
            Some(day) => day.read().await.reservations.clone(),
            None => Vec::new(),
        }
    }

    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let date = self.reservation_day.get(&id).map(|e| *e.value())?;
        let day = self.existing_day(date)?;
        let guard = day.read().await;
        guard.reservations.iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot of every booking, one day lock at a time.
    pub async fn all_reservations(&self) -> Vec<Reservation> {
        let mut days: Vec<(NaiveDate, super::SharedDay)> =
            self.days.iter().map(|e| (*e.key(), e.value().clone())).collect();
        days.sort_by_key(|(date, _)| *date);
        let mut all = Vec::new();
        for (_, day) in days {
            all.extend(day.read().await.reservations.iter().cloned());
        }
        all
    }

    /// Unbooked windows inside business hours for `staff` (any booking when `None`).
    pub async fn free_windows(
        &self,
        date: NaiveDate,
        staff: Option<Ulid>,
        policy: &SchedulePolicy,
    ) -> Vec<Span> {
        let busy = match self.existing_day(date) {
            Some(day) => day.read().await.blocking_spans(staff),
            None => Vec::new(),
        };
        schedule::free_windows(&busy, policy)
    }

    /// Matching count and the first page ordered by name. `search` matches
    /// name, phone or email case-insensitively.
    pub fn contact_page(&self, search: Option<&str>) -> (usize, Vec<Contact>) {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let contains = |field: &Option<String>, needle: &str| {
            field
                .as_ref()
                .is_some_and(|v| v.to_lowercase().contains(needle))
        };
        let mut matching: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|e| match &needle {
                None => true,
                Some(n) => {
                    let c = e.value();
                    c.name.to_lowercase().contains(n.as_str())
                        || contains(&c.phone, n)
                        || contains(&c.email, n)
                }
            })
            .map(|e| e.value().clone())
            .collect();
        let total = matching.len();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        matching.truncate(CONTACT_PAGE_SIZE);
        (total, matching)
    }

    pub fn contact_counts(&self, today: NaiveDate) -> ContactCounts {
        let (start, end) = revenue::local_day_bounds(today);
        ContactCounts {
            total: self.contacts.len(),
            created_today: self
                .contacts
                .iter()
                .filter(|e| (start..end).contains(&e.value().created_at))
                .count(),
        }
    }

    pub async fn revenue(&self, today: NaiveDate, range: DateRange) -> RevenueStats {
        let reservations = self.all_reservations().await;
        revenue::rollup(
            &reservations,
            &self.price_table(),
            today,
            range,
            self.contact_counts(today),
        )
    }

    pub fn list_appointments(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        appointments.sort_by_key(|a| (a.start, a.id));
        appointments
    }

    pub fn get_appointment(&self, id: &Ulid) -> Option<Appointment> {
        self.appointments.get(id).map(|e| e.value().clone())
    }

    /// Newest first.
    pub fn recent_notifications(&self, limit: usize) -> Vec<Notification> {
        let mut notifications: Vec<Notification> =
            self.notifications.iter().map(|e| e.value().clone()).collect();
        notifications.sort_by(|a, b| b.id.cmp(&a.id));
        notifications.truncate(limit);
        notifications
    }
}
