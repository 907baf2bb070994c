//! Availability resolver: subtracts a doctor's existing commitments from
//! the generated slot list. Every read is fresh; nothing is cached across
//! calls, since other sessions book concurrently.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::calendar::{self, TimeSlot};
use crate::config::OperatingHours;
use crate::db::repository::{appointment, leave as leave_repo};
use crate::error::SchedulingError;

/// The full generated slot list for a day with each slot's availability
/// resolved against the doctor's non-cancelled appointments. A day inside
/// an approved leave has every slot marked unavailable.
pub fn day_schedule(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
    hours: &OperatingHours,
) -> Result<Vec<TimeSlot>, SchedulingError> {
    let mut slots = calendar::generate_slots(day, hours);

    if leave_repo::approved_leave_covers(conn, doctor_id, day)? {
        for slot in &mut slots {
            slot.available = false;
        }
        return Ok(slots);
    }

    let (day_start, day_end) = calendar::day_bounds(day);
    let occupied = appointment::active_between(conn, doctor_id, &day_start, &day_end)?;
    let slot_len = Duration::minutes(hours.slot_minutes);

    for slot in &mut slots {
        slot.available = !occupied
            .iter()
            .any(|appt| slot.overlaps(appt.slot_start, appt.slot_start + slot_len));
    }
    Ok(slots)
}

/// Chronologically ordered free slots for the doctor and day.
pub fn free_slots(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
    hours: &OperatingHours,
) -> Result<Vec<TimeSlot>, SchedulingError> {
    Ok(day_schedule(conn, doctor_id, day, hours)?
        .into_iter()
        .filter(|slot| slot.available)
        .collect())
}

/// Point query: is this exact slot free for the doctor right now? A read
/// answer only; `book` re-validates at write time. An instant that is not
/// a generated slot start, or that falls on an approved leave day, is
/// never free, so this query cannot disagree with the slot list.
pub fn is_free(
    conn: &Connection,
    doctor_id: &Uuid,
    slot_start: NaiveDateTime,
    hours: &OperatingHours,
) -> Result<bool, SchedulingError> {
    if !calendar::is_valid_slot_start(slot_start, hours) {
        return Ok(false);
    }
    if leave_repo::approved_leave_covers(conn, doctor_id, slot_start.date())? {
        return Ok(false);
    }

    let slot_len = Duration::minutes(hours.slot_minutes);
    let (day_start, day_end) = calendar::day_bounds(slot_start.date());
    let occupied = appointment::active_between(conn, doctor_id, &day_start, &day_end)?;

    let slot_end = slot_start + slot_len;
    Ok(!occupied
        .iter()
        .any(|appt| slot_start < appt.slot_start + slot_len && slot_end > appt.slot_start))
}
