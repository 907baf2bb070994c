use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentKind, AppointmentStatus};

/// A booked slot. Never deleted: cancellation and completion are status
/// transitions, so the row doubles as audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Slot start; the end is implied by the configured slot length.
    pub slot_start: NaiveDateTime,
    pub status: AppointmentStatus,
    pub kind: AppointmentKind,
    /// Set after completion, once a prescription exists for this visit.
    pub prescription_id: Option<Uuid>,
    /// Caller-supplied key making retries of `book` safe after a timeout.
    pub idempotency_key: String,
    pub created_at: NaiveDateTime,
}
