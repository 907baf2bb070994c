//! Day boundaries and slot partitions in the fixed operating timezone.
//!
//! Pure functions only: the slot list for a day is a deterministic product
//! of the calendar day and the configured operating hours. Slots are
//! half-open `[start, end)` intervals, `end = start + slot_minutes`, and
//! are generated only inside the two daily windows.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::OperatingHours;

/// A bookable time window for one doctor. `available` is only meaningful
/// while a candidate list is being computed; slots are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub available: bool,
}

impl TimeSlot {
    /// Half-open interval overlap: a shared boundary instant is not an
    /// overlap, so abutting slots are both bookable.
    pub fn overlaps(&self, other_start: NaiveDateTime, other_end: NaiveDateTime) -> bool {
        self.start < other_end && self.end > other_start
    }
}

/// `[midnight, next midnight)` for the given day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

/// The canonical ordered slot list for a day: every slot that fits entirely
/// inside one of the operating windows, chronological, all marked available.
pub fn generate_slots(day: NaiveDate, hours: &OperatingHours) -> Vec<TimeSlot> {
    let slot_len = Duration::minutes(hours.slot_minutes);
    let mut slots = Vec::new();

    for window in hours.windows() {
        let mut start = day.and_time(window.opens);
        let close = day.and_time(window.closes);
        while start + slot_len <= close {
            slots.push(TimeSlot {
                start,
                end: start + slot_len,
                available: true,
            });
            start += slot_len;
        }
    }

    slots
}

/// Would this instant be the start of a generated slot on its day? The
/// booking manager rejects anything else before touching storage.
pub fn is_valid_slot_start(instant: NaiveDateTime, hours: &OperatingHours) -> bool {
    generate_slots(instant.date(), hours)
        .iter()
        .any(|slot| slot.start == instant)
}
