use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

/// Domain-level failure taxonomy. Conflict variants mean the caller should
/// re-query availability and pick again; `Transient` means retry with the
/// same idempotency key is safe.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("slot {slot_start} is already booked for doctor {doctor_id}")]
    SlotConflict {
        doctor_id: Uuid,
        slot_start: NaiveDateTime,
    },

    #[error("bed {bed_id} is not available")]
    BedUnavailable { bed_id: Uuid },

    #[error("doctor {doctor_id} is on approved leave on {day}")]
    DoctorOnLeave { doctor_id: Uuid, day: NaiveDate },

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    #[error("invalid transition: {entity_type} {id} is {status}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        status: String,
    },

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(code, msg))
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Transient(msg.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Database(other),
        }
    }
}

/// Is this rusqlite error a UNIQUE violation whose message names `needle`?
/// Used to tell the scheduled-slot guard apart from the idempotency key.
pub(crate) fn is_unique_violation(err: &rusqlite::Error, needle: &str) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(needle)
    )
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
