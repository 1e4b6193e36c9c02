use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::schedule::{SchedulePolicy, SlotCheck, check_slot};

use super::EngineError;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

pub(crate) fn validate_customer(customer: &Customer) -> Result<(), EngineError> {
    if customer.name.trim().is_empty() {
        return Err(EngineError::Invalid("customer name is empty"));
    }
    if customer.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("customer name too long"));
    }
    let too_long = |v: &Option<String>| v.as_ref().is_some_and(|s| s.len() > MAX_NAME_LEN);
    if too_long(&customer.phone) || too_long(&customer.email) {
        return Err(EngineError::LimitExceeded("contact field too long"));
    }
    Ok(())
}

pub(crate) fn validate_party_size(party_size: u32) -> Result<u32, EngineError> {
    if party_size > MAX_PARTY_SIZE {
        return Err(EngineError::LimitExceeded("party size too large"));
    }
    Ok(party_size.max(1))
}

/// Check `span` against the day's active bookings for `staff` (all bookings
/// when unassigned).
pub(crate) fn check_no_conflict(
    day: &DayBook,
    span: Span,
    staff: Option<Ulid>,
    policy: &SchedulePolicy,
) -> Result<(), EngineError> {
    let existing = day.blocking_spans(staff);
    match check_slot(span, &existing, policy) {
        SlotCheck::Free(_) => Ok(()),
        SlotCheck::Occupied { alternatives } => Err(EngineError::SlotOccupied { alternatives }),
    }
}
