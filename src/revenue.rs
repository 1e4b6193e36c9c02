use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    /// Monday through Sunday.
    Week,
    #[default]
    Month,
    All,
}

impl std::str::FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(DateRange::Today),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            "all" => Ok(DateRange::All),
            other => Err(format!("unknown date range: {other}")),
        }
    }
}

impl DateRange {
    /// Inclusive `(first, last)` dates of the selected period.
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DateRange::Today => (today, today),
            DateRange::Week => {
                let offset = today.weekday().num_days_from_monday() as u64;
                let monday = today.checked_sub_days(Days::new(offset)).unwrap_or(today);
                let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(today);
                (monday, sunday)
            }
            DateRange::Month => {
                let first = today.with_day(1).unwrap_or(today);
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(today);
                (first, last)
            }
            DateRange::All => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
                (epoch, today)
            }
        }
    }
}

/// Counts that come from the contact list rather than from bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactCounts {
    pub total: usize,
    pub created_today: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevenueStats {
    pub total_revenue: Cents,
    pub today_revenue: Cents,
    pub period_revenue: Cents,
    pub today_customers: usize,
    pub total_customers: usize,
    pub new_customers_today: usize,
    pub reservations_with_revenue: u64,
    pub total_reservation_count: u64,
    pub period_reservation_count: u64,
    pub today_reservation_count: u64,
}

/// Price per person: the paid price if recorded, else the product's list price.
pub fn unit_price(reservation: &Reservation, prices: &HashMap<Ulid, Cents>) -> Cents {
    reservation
        .price_paid
        .or_else(|| reservation.product_id.and_then(|p| prices.get(&p).copied()))
        .unwrap_or(0)
}

/// Roll up revenue and head counts over confirmed/completed bookings.
///
/// Only bookings that actually earned money touch the revenue counters;
/// every considered booking adds its party size to `total_reservation_count`.
pub fn rollup(
    reservations: &[Reservation],
    prices: &HashMap<Ulid, Cents>,
    today: NaiveDate,
    range: DateRange,
    contacts: ContactCounts,
) -> RevenueStats {
    let (period_start, period_end) = range.bounds(today);
    let mut stats = RevenueStats::default();
    let mut all_customers: HashSet<&str> = HashSet::new();
    let mut today_customers: HashSet<&str> = HashSet::new();

    for r in reservations.iter().filter(|r| r.status.earns_revenue()) {
        let party = r.party_size.max(1);
        let revenue = unit_price(r, prices) * party as Cents;

        if revenue > 0 {
            stats.total_revenue += revenue;
            stats.reservations_with_revenue += party as u64;

            if r.date >= period_start && r.date <= period_end {
                stats.period_revenue += revenue;
                stats.period_reservation_count += party as u64;
            }
            if r.date == today {
                stats.today_revenue += revenue;
                stats.today_reservation_count += party as u64;
            }
        }

        stats.total_reservation_count += party as u64;

        if let Some(key) = r.customer.key() {
            all_customers.insert(key);
            if r.date == today {
                today_customers.insert(key);
            }
        }
    }

    stats.today_customers = today_customers.len();
    stats.total_customers = if contacts.total > 0 {
        contacts.total
    } else {
        all_customers.len()
    };
    stats.new_customers_today = contacts.created_today;
    stats
}

/// Unix-ms bounds `[start, end)` of a local calendar day.
pub fn local_day_bounds(day: NaiveDate) -> (Ms, Ms) {
    let start_of = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_local_timezone(Local).earliest())
            .map(|dt| dt.timestamp_millis())
    };
    let start = start_of(day).unwrap_or(0);
    let end = day
        .succ_opt()
        .and_then(start_of)
        .unwrap_or(start + 86_400_000);
    (start, end)
}
