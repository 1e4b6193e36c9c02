use crate::model::*;

/// Fixed booking policy for one deployment: slot length and the grid of
/// start times offered as alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Length of every requested slot, and of a stored booking without an end.
    pub slot_minutes: Minute,
    /// First grid hour.
    pub open_hour: u32,
    /// Grid stops before this hour (exclusive).
    pub close_hour: u32,
    pub step_minutes: Minute,
    pub max_alternatives: usize,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            slot_minutes: 90,
            open_hour: 11,
            close_hour: 22,
            step_minutes: 30,
            max_alternatives: 5,
        }
    }
}

impl SchedulePolicy {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.slot_minutes <= 0 {
            return Err("slot length must be positive");
        }
        if self.step_minutes <= 0 {
            return Err("grid step must be positive");
        }
        if self.open_hour >= self.close_hour {
            return Err("open hour must be before close hour");
        }
        if self.close_hour > 24 {
            return Err("close hour must be at most 24");
        }
        if self.max_alternatives == 0 {
            return Err("at least one alternative must be offered");
        }
        Ok(())
    }

    pub fn slot_at(&self, start: Minute) -> Span {
        Span::new(start, start + self.slot_minutes)
    }

    /// Span stored for a booking starting at `start`. An end that is not
    /// after the start counts as no end, which means the default slot length.
    pub fn booking_span(&self, start: Minute, end: Option<Minute>) -> Span {
        match end {
            Some(end) if end > start => Span::new(start, end),
            _ => self.slot_at(start),
        }
    }

    /// Candidate start times: `open_hour:00` in `step_minutes` steps, up to
    /// but excluding `close_hour:00`.
    pub fn grid(&self) -> impl Iterator<Item = Minute> {
        let first = self.open_hour as Minute * 60;
        let last = self.close_hour as Minute * 60;
        (first..last).step_by(self.step_minutes.max(1) as usize)
    }

    /// The bookable window of a day, `[open_hour, close_hour)`.
    pub fn business_hours(&self) -> Span {
        Span::new(self.open_hour as Minute * 60, self.close_hour as Minute * 60)
    }
}

/// Outcome of checking one requested span against a day's bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotCheck {
    Free(Span),
    Occupied { alternatives: Vec<Minute> },
}

/// Linear overlap scan. Daily booking counts are small.
pub fn conflicts(requested: &Span, existing: &[Span]) -> bool {
    existing.iter().any(|e| requested.overlaps(e))
}

/// Grid slots that do not overlap any existing span, earliest first,
/// at most `max_alternatives`.
pub fn find_alternatives(existing: &[Span], policy: &SchedulePolicy) -> Vec<Minute> {
    policy
        .grid()
        .filter(|&start| !conflicts(&policy.slot_at(start), existing))
        .take(policy.max_alternatives)
        .collect()
}

pub fn check_slot(requested: Span, existing: &[Span], policy: &SchedulePolicy) -> SlotCheck {
    if conflicts(&requested, existing) {
        SlotCheck::Occupied {
            alternatives: find_alternatives(existing, policy),
        }
    } else {
        SlotCheck::Free(requested)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Match a free-text staff name against active staff: exact (case-insensitive)
/// first, then the first name containing the search text or contained in it.
pub fn resolve_staff<'a>(name: &str, staff: &'a [StaffMember]) -> Option<&'a StaffMember> {
    let needle = normalize(name);
    if needle.is_empty() {
        return None;
    }
    let candidates = || {
        staff
            .iter()
            .filter(|s| s.active)
            .map(|s| (s, normalize(&s.name)))
            .filter(|(_, n)| !n.is_empty())
    };
    candidates()
        .find(|(_, n)| *n == needle)
        .or_else(|| candidates().find(|(_, n)| n.contains(&needle) || needle.contains(n.as_str())))
        .map(|(s, _)| s)
}

// ── Free windows ────────────────────────────────────────────────

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Unbooked windows inside business hours.
pub fn free_windows(existing: &[Span], policy: &SchedulePolicy) -> Vec<Span> {
    let mut busy = existing.to_vec();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);
    subtract_intervals(&[policy.business_hours()], &busy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Minute = 60;

    fn staff(name: &str, active: bool) -> StaffMember {
        StaffMember {
            id: Ulid::new(),
            name: name.into(),
            active,
        }
    }

    // ── overlap ───────────────────────────────────────────

    #[test]
    fn overlap_is_symmetric() {
        let spans = [
            Span::new(10 * H, 11 * H),
            Span::new(10 * H + 30, 12 * H),
            Span::new(11 * H, 12 * H),
            Span::new(9 * H, 13 * H),
            Span::new(14 * H, 15 * H),
        ];
        for a in &spans {
            for b in &spans {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn adjacent_bookings_do_not_conflict() {
        let existing = [Span::new(14 * H, 15 * H + 30)];
        assert!(!conflicts(&Span::new(15 * H + 30, 17 * H), &existing));
        assert!(!conflicts(&Span::new(12 * H + 30, 14 * H), &existing));
    }

    #[test]
    fn identical_interval_conflicts() {
        let existing = [Span::new(14 * H, 15 * H + 30)];
        assert!(conflicts(&Span::new(14 * H, 15 * H + 30), &existing));
    }

    #[test]
    fn empty_day_never_conflicts() {
        assert!(!conflicts(&Span::new(0, 90), &[]));
    }

    // ── booking span ──────────────────────────────────────

    #[test]
    fn booking_span_defaults_to_slot_length() {
        let policy = SchedulePolicy::default();
        assert_eq!(policy.booking_span(14 * H, None), Span::new(14 * H, 15 * H + 30));
        assert_eq!(policy.booking_span(14 * H, Some(14 * H)), Span::new(14 * H, 15 * H + 30));
        assert_eq!(policy.booking_span(14 * H, Some(15 * H)), Span::new(14 * H, 15 * H));
    }

    #[test]
    fn end_before_start_falls_back_to_slot_length() {
        let policy = SchedulePolicy::default();
        assert_eq!(policy.booking_span(14 * H, Some(13 * H)), Span::new(14 * H, 15 * H + 30));
        assert_eq!(policy.booking_span(23 * H, Some(30)), Span::new(23 * H, 24 * H + 30));
    }

    // ── grid ──────────────────────────────────────────────

    #[test]
    fn default_grid_is_eleven_to_half_past_nine() {
        let grid: Vec<_> = SchedulePolicy::default().grid().collect();
        assert_eq!(grid.len(), 22);
        assert_eq!(grid.first(), Some(&(11 * H)));
        assert_eq!(grid.last(), Some(&(21 * H + 30)));
    }

    #[test]
    fn policy_validation() {
        assert!(SchedulePolicy::default().validate().is_ok());
        let bad = SchedulePolicy {
            open_hour: 22,
            close_hour: 11,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = SchedulePolicy {
            step_minutes: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = SchedulePolicy {
            close_hour: 25,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    // ── alternatives ──────────────────────────────────────

    #[test]
    fn conflict_at_half_past_two_offers_morning_slots() {
        let policy = SchedulePolicy::default();
        let existing = [Span::new(14 * H, 15 * H + 30)];
        let alternatives = match check_slot(policy.slot_at(14 * H + 30), &existing, &policy) {
            SlotCheck::Occupied { alternatives } => alternatives,
            other => panic!("expected conflict, got {other:?}"),
        };
        assert_eq!(
            alternatives,
            vec![11 * H, 11 * H + 30, 12 * H, 12 * H + 30, 15 * H + 30]
        );
    }

    #[test]
    fn alternatives_never_conflict_and_are_sorted() {
        let policy = SchedulePolicy::default();
        let existing = [
            Span::new(11 * H, 12 * H + 30),
            Span::new(13 * H, 14 * H),
            Span::new(17 * H, 19 * H),
        ];
        let alternatives = find_alternatives(&existing, &policy);
        assert!(alternatives.len() <= policy.max_alternatives);
        assert!(alternatives.windows(2).all(|w| w[0] < w[1]));
        for start in &alternatives {
            assert!(!conflicts(&policy.slot_at(*start), &existing));
        }
    }

    #[test]
    fn fully_booked_day_has_no_alternatives() {
        let policy = SchedulePolicy::default();
        let existing = [Span::new(9 * H, 24 * H)];
        assert!(find_alternatives(&existing, &policy).is_empty());
    }

    #[test]
    fn free_request_passes_through() {
        let policy = SchedulePolicy::default();
        let existing = [Span::new(14 * H, 15 * H + 30)];
        let requested = policy.slot_at(16 * H);
        assert_eq!(check_slot(requested, &existing, &policy), SlotCheck::Free(requested));
    }

    #[test]
    fn custom_grid_is_respected() {
        let policy = SchedulePolicy {
            slot_minutes: 60,
            open_hour: 9,
            close_hour: 12,
            step_minutes: 60,
            max_alternatives: 10,
        };
        let existing = [Span::new(10 * H, 11 * H)];
        assert_eq!(find_alternatives(&existing, &policy), vec![9 * H, 11 * H]);
    }

    // ── staff resolution ──────────────────────────────────

    #[test]
    fn empty_name_means_unassigned() {
        let team = [staff("Anna", true)];
        assert!(resolve_staff("", &team).is_none());
        assert!(resolve_staff("   ", &team).is_none());
    }

    #[test]
    fn exact_match_beats_partial() {
        let team = [staff("Anna Maria", true), staff("Anna", true)];
        let found = resolve_staff("  ANNA ", &team).unwrap();
        assert_eq!(found.name, "Anna");
    }

    #[test]
    fn partial_match_in_both_directions() {
        let team = [staff("Maximilian", true)];
        assert_eq!(resolve_staff("max", &team).unwrap().name, "Maximilian");
        let team = [staff("Ben", true)];
        assert_eq!(resolve_staff("ben schmidt", &team).unwrap().name, "Ben");
    }

    #[test]
    fn inactive_and_unknown_staff_do_not_match() {
        let team = [staff("Clara", false), staff("Dora", true)];
        assert!(resolve_staff("clara", &team).is_none());
        assert!(resolve_staff("Zoe", &team).is_none());
    }

    // ── free windows ──────────────────────────────────────

    #[test]
    fn subtract_middle_punch() {
        let base = vec![Span::new(100, 300)];
        let remove = vec![Span::new(150, 200)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, vec![Span::new(100, 150), Span::new(200, 300)]);
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![Span::new(100, 200), Span::new(200, 300), Span::new(400, 500)];
        let merged = merge_overlapping(&spans);
        assert_eq!(merged, vec![Span::new(100, 300), Span::new(400, 500)]);
    }

    #[test]
    fn free_windows_clip_to_business_hours() {
        let policy = SchedulePolicy::default();
        let existing = [
            Span::new(15 * H, 16 * H + 30),
            Span::new(10 * H, 12 * H),
            Span::new(16 * H, 17 * H),
        ];
        assert_eq!(
            free_windows(&existing, &policy),
            vec![Span::new(12 * H, 15 * H), Span::new(17 * H, 22 * H)]
        );
    }
}
