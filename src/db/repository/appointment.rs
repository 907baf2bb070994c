use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_from_db, datetime_to_db, uuid_from_db};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentKind, AppointmentStatus};

const COLUMNS: &str = "id, doctor_id, patient_id, slot_start, status, kind, \
                       prescription_id, idempotency_key, created_at";

/// Insert a new appointment row. A UNIQUE violation on the scheduled-slot
/// guard or the idempotency key surfaces as `DatabaseError::Sqlite`; the
/// booking manager interprets it.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, doctor_id, patient_id, slot_start, status, kind,
         prescription_id, idempotency_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appt.id.to_string(),
            appt.doctor_id.to_string(),
            appt.patient_id.to_string(),
            datetime_to_db(&appt.slot_start),
            appt.status.as_str(),
            appt.kind.as_str(),
            appt.prescription_id.map(|id| id.to_string()),
            appt.idempotency_key,
            datetime_to_db(&appt.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], row_to_parts);
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replay lookup for `book` retries.
pub fn get_by_idempotency_key(
    conn: &Connection,
    key: &str,
) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments WHERE idempotency_key = ?1"
    ))?;

    let result = stmt.query_row(params![key], row_to_parts);
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Non-cancelled appointments for a doctor with slot_start in [from, to),
/// chronological order. Used by the availability resolver.
pub fn active_between(
    conn: &Connection,
    doctor_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments
         WHERE doctor_id = ?1 AND status != 'cancelled'
           AND slot_start >= ?2 AND slot_start < ?3
         ORDER BY slot_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![doctor_id.to_string(), datetime_to_db(from), datetime_to_db(to)],
        row_to_parts,
    )?;

    collect_appointments(rows)
}

/// Scheduled appointments for a doctor with slot_start in [from, to),
/// chronological order. Used by the leave cascade.
pub fn scheduled_between(
    conn: &Connection,
    doctor_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments
         WHERE doctor_id = ?1 AND status = 'scheduled'
           AND slot_start >= ?2 AND slot_start < ?3
         ORDER BY slot_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![doctor_id.to_string(), datetime_to_db(from), datetime_to_db(to)],
        row_to_parts,
    )?;

    collect_appointments(rows)
}

/// Every appointment for a doctor in [from, to) regardless of status:
/// the audit-trail listing (cancelled rows included).
pub fn all_between(
    conn: &Connection,
    doctor_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments
         WHERE doctor_id = ?1 AND slot_start >= ?2 AND slot_start < ?3
         ORDER BY slot_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![doctor_id.to_string(), datetime_to_db(from), datetime_to_db(to)],
        row_to_parts,
    )?;

    collect_appointments(rows)
}

pub fn count_scheduled_between(
    conn: &Connection,
    doctor_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND status = 'scheduled'
           AND slot_start >= ?2 AND slot_start < ?3",
        params![doctor_id.to_string(), datetime_to_db(from), datetime_to_db(to)],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Guarded status transition out of `scheduled`. Returns the number of rows
/// changed (0 when the appointment is missing or no longer scheduled);
/// atomic with the status read thanks to the WHERE clause.
pub fn set_status_if_scheduled(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2 AND status = 'scheduled'",
        params![status.as_str(), id.to_string()],
    )?;
    Ok(changed)
}

/// Guarded slot move. The partial unique index applies to UPDATE as well,
/// so a move onto an occupied slot fails with a constraint violation.
pub fn update_slot_if_scheduled(
    conn: &Connection,
    id: &Uuid,
    new_start: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET slot_start = ?1 WHERE id = ?2 AND status = 'scheduled'",
        params![datetime_to_db(new_start), id.to_string()],
    )?;
    Ok(changed)
}

/// Link a prescription to a completed appointment.
pub fn set_prescription_if_completed(
    conn: &Connection,
    id: &Uuid,
    prescription_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET prescription_id = ?1
         WHERE id = ?2 AND status = 'completed'",
        params![prescription_id.to_string(), id.to_string()],
    )?;
    Ok(changed)
}

// Internal row type for Appointment mapping
struct AppointmentRow {
    id: String,
    doctor_id: String,
    patient_id: String,
    slot_start: String,
    status: String,
    kind: String,
    prescription_id: Option<String>,
    idempotency_key: String,
    created_at: String,
}

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        slot_start: row.get(3)?,
        status: row.get(4)?,
        kind: row.get(5)?,
        prescription_id: row.get(6)?,
        idempotency_key: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: uuid_from_db(&row.id)?,
        doctor_id: uuid_from_db(&row.doctor_id)?,
        patient_id: uuid_from_db(&row.patient_id)?,
        slot_start: datetime_from_db(&row.slot_start)?,
        status: AppointmentStatus::from_str(&row.status)?,
        kind: AppointmentKind::from_str(&row.kind)?,
        prescription_id: match row.prescription_id {
            Some(s) => Some(uuid_from_db(&s)?),
            None => None,
        },
        idempotency_key: row.idempotency_key,
        created_at: datetime_from_db(&row.created_at)?,
    })
}

fn collect_appointments(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow>>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(appointment_from_row(row?)?);
    }
    Ok(out)
}
