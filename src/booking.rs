//! Booking manager: creates, cancels, reschedules, and completes
//! appointments.
//!
//! The no-overlap invariant is enforced at write time by the storage
//! layer's conditional writes, never by a read-then-write in application
//! code: the partial unique index on `(doctor_id, slot_start)` makes
//! `book` and `reschedule` conflict writes, so of two concurrent attempts
//! on one slot exactly one succeeds and the other sees `SlotConflict`.

use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability;
use crate::calendar;
use crate::config::OperatingHours;
use crate::db::repository::{appointment, doctor, leave as leave_repo};
use crate::db::DatabaseError;
use crate::error::{is_constraint_violation, is_unique_violation, SchedulingError};
use crate::models::{Appointment, AppointmentKind, AppointmentStatus};

/// Everything needed to create an appointment. The idempotency key comes
/// from the caller so a timed-out submission can be retried safely.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub slot_start: NaiveDateTime,
    pub kind: AppointmentKind,
    pub idempotency_key: String,
}

/// Whether `book` created a new appointment or replayed an earlier one
/// with the same idempotency key.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    Created(Appointment),
    Replayed(Appointment),
}

impl BookingOutcome {
    pub fn appointment(&self) -> &Appointment {
        match self {
            Self::Created(appt) | Self::Replayed(appt) => appt,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }
}

/// Result of `cancel`. Repeated cancellation is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}

/// Atomic check-then-reserve. The availability pre-check gives a fast
/// answer, but the conditional insert is what actually decides the race.
pub fn book(
    conn: &Connection,
    req: &BookingRequest,
    hours: &OperatingHours,
) -> Result<BookingOutcome, SchedulingError> {
    if req.idempotency_key.trim().is_empty() {
        return Err(SchedulingError::Validation("idempotency key must not be empty".into()));
    }
    if !calendar::is_valid_slot_start(req.slot_start, hours) {
        return Err(SchedulingError::Validation(format!(
            "{} is not a bookable slot start",
            req.slot_start
        )));
    }

    // Retry of an already-committed submission returns the original row.
    if let Some(existing) = appointment::get_by_idempotency_key(conn, &req.idempotency_key)? {
        info!(appointment_id = %existing.id, "book replayed by idempotency key");
        return Ok(BookingOutcome::Replayed(existing));
    }

    doctor::get_doctor(conn, &req.doctor_id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Doctor".into(),
        id: req.doctor_id.to_string(),
    })?;

    // An approved leave removes the whole day from the bookable set, so a
    // post-approval booking cannot undo the cascade.
    if leave_repo::approved_leave_covers(conn, &req.doctor_id, req.slot_start.date())? {
        warn!(doctor_id = %req.doctor_id, day = %req.slot_start.date(), "booking on a leave day");
        return Err(SchedulingError::DoctorOnLeave {
            doctor_id: req.doctor_id,
            day: req.slot_start.date(),
        });
    }

    if !availability::is_free(conn, &req.doctor_id, req.slot_start, hours)? {
        warn!(doctor_id = %req.doctor_id, slot_start = %req.slot_start, "slot taken before write");
        return Err(SchedulingError::SlotConflict {
            doctor_id: req.doctor_id,
            slot_start: req.slot_start,
        });
    }

    let appt = Appointment {
        id: Uuid::new_v4(),
        doctor_id: req.doctor_id,
        patient_id: req.patient_id,
        slot_start: req.slot_start,
        status: AppointmentStatus::Scheduled,
        kind: req.kind,
        prescription_id: None,
        idempotency_key: req.idempotency_key.clone(),
        created_at: Local::now().naive_local(),
    };

    match appointment::insert_appointment(conn, &appt) {
        Ok(()) => {
            info!(appointment_id = %appt.id, doctor_id = %appt.doctor_id,
                  slot_start = %appt.slot_start, "appointment booked");
            Ok(BookingOutcome::Created(appt))
        }
        // A concurrent retry with the same key won the insert.
        Err(DatabaseError::Sqlite(e)) if is_unique_violation(&e, "idempotency_key") => {
            let existing = appointment::get_by_idempotency_key(conn, &req.idempotency_key)?
                .ok_or_else(|| {
                    SchedulingError::Transient("idempotent insert raced; retry".into())
                })?;
            Ok(BookingOutcome::Replayed(existing))
        }
        // The slot guard fired: another session booked between our read
        // and our write. Exactly one of us gets here.
        Err(DatabaseError::Sqlite(e)) if is_constraint_violation(&e) => {
            warn!(doctor_id = %req.doctor_id, slot_start = %req.slot_start, "slot conflict at write");
            Err(SchedulingError::SlotConflict {
                doctor_id: req.doctor_id,
                slot_start: req.slot_start,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Transition scheduled → cancelled. Idempotent: a second call reports
/// `AlreadyCancelled`. Cancelling a completed appointment is invalid.
pub fn cancel(conn: &Connection, id: &Uuid) -> Result<CancelOutcome, SchedulingError> {
    if appointment::set_status_if_scheduled(conn, id, AppointmentStatus::Cancelled)? == 1 {
        info!(appointment_id = %id, "appointment cancelled");
        return Ok(CancelOutcome::Cancelled);
    }

    let appt = appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    })?;
    match appt.status {
        AppointmentStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
        AppointmentStatus::Completed => Err(SchedulingError::InvalidTransition {
            entity_type: "Appointment".into(),
            id: id.to_string(),
            status: appt.status.as_str().into(),
        }),
        // The guard missed but the row reads scheduled: a concurrent
        // writer slipped in between; retryable.
        AppointmentStatus::Scheduled => {
            Err(SchedulingError::Transient("cancel lost a write race; retry".into()))
        }
    }
}

/// Atomically move a scheduled appointment to a new slot. The slot guard
/// applies to the UPDATE too, so moving onto an occupied slot conflicts.
pub fn reschedule(
    conn: &Connection,
    id: &Uuid,
    new_start: NaiveDateTime,
    hours: &OperatingHours,
) -> Result<Appointment, SchedulingError> {
    if !calendar::is_valid_slot_start(new_start, hours) {
        return Err(SchedulingError::Validation(format!(
            "{new_start} is not a bookable slot start"
        )));
    }

    let appt = appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    })?;
    if appt.status != AppointmentStatus::Scheduled {
        return Err(SchedulingError::InvalidTransition {
            entity_type: "Appointment".into(),
            id: id.to_string(),
            status: appt.status.as_str().into(),
        });
    }

    if leave_repo::approved_leave_covers(conn, &appt.doctor_id, new_start.date())? {
        return Err(SchedulingError::DoctorOnLeave {
            doctor_id: appt.doctor_id,
            day: new_start.date(),
        });
    }

    match appointment::update_slot_if_scheduled(conn, id, &new_start) {
        Ok(1) => {
            info!(appointment_id = %id, new_start = %new_start, "appointment rescheduled");
            appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
                entity_type: "Appointment".into(),
                id: id.to_string(),
            })
        }
        Ok(_) => Err(SchedulingError::Transient("reschedule lost a write race; retry".into())),
        Err(DatabaseError::Sqlite(e)) if is_constraint_violation(&e) => {
            warn!(appointment_id = %id, new_start = %new_start, "reschedule slot conflict");
            Err(SchedulingError::SlotConflict {
                doctor_id: appt.doctor_id,
                slot_start: new_start,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Transition scheduled → completed (terminal).
pub fn complete(conn: &Connection, id: &Uuid) -> Result<(), SchedulingError> {
    if appointment::set_status_if_scheduled(conn, id, AppointmentStatus::Completed)? == 1 {
        info!(appointment_id = %id, "appointment completed");
        return Ok(());
    }

    let appt = appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    })?;
    Err(SchedulingError::InvalidTransition {
        entity_type: "Appointment".into(),
        id: id.to_string(),
        status: appt.status.as_str().into(),
    })
}

/// Link the prescription produced after a completed visit.
pub fn attach_prescription(
    conn: &Connection,
    id: &Uuid,
    prescription_id: &Uuid,
) -> Result<(), SchedulingError> {
    if appointment::set_prescription_if_completed(conn, id, prescription_id)? == 1 {
        info!(appointment_id = %id, prescription_id = %prescription_id, "prescription attached");
        return Ok(());
    }

    let appt = appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    })?;
    Err(SchedulingError::InvalidTransition {
        entity_type: "Appointment".into(),
        id: id.to_string(),
        status: appt.status.as_str().into(),
    })
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Appointment, SchedulingError> {
    appointment::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    })
}

/// Day listing for a doctor, cancelled rows included (audit trail).
pub fn appointments_for_day(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
) -> Result<Vec<Appointment>, SchedulingError> {
    let (day_start, day_end) = calendar::day_bounds(day);
    Ok(appointment::all_between(conn, doctor_id, &day_start, &day_end)?)
}
