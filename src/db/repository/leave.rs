use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{date_from_db, uuid_from_db};
use crate::db::DatabaseError;
use crate::models::{Leave, LeaveKind, LeaveStatus};

const COLUMNS: &str = "id, doctor_id, facility_id, kind, reason, start_date, end_date, status";

pub fn insert_leave(conn: &Connection, leave: &Leave) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO leaves (id, doctor_id, facility_id, kind, reason, start_date, end_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            leave.id.to_string(),
            leave.doctor_id.to_string(),
            leave.facility_id.to_string(),
            leave.kind.as_str(),
            leave.reason,
            leave.start_date.to_string(),
            leave.end_date.to_string(),
            leave.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_leave(conn: &Connection, id: &Uuid) -> Result<Option<Leave>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM leaves WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], row_to_parts);
    match result {
        Ok(row) => Ok(Some(leave_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Does the doctor already have a pending leave? Used by the
/// single-pending policy check.
pub fn pending_exists(conn: &Connection, doctor_id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leaves WHERE doctor_id = ?1 AND status = 'pending'",
        params![doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Does any approved leave for the doctor cover the given day? Dates are
/// stored as ISO TEXT, so the range predicate works lexicographically.
pub fn approved_leave_covers(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leaves
         WHERE doctor_id = ?1 AND status = 'approved'
           AND start_date <= ?2 AND end_date >= ?2",
        params![doctor_id.to_string(), day.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Guarded terminal transition. Zero rows changed means the leave is
/// missing or already decided; the leave manager disambiguates.
pub fn set_status_if_pending(
    conn: &Connection,
    id: &Uuid,
    status: LeaveStatus,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE leaves SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![status.as_str(), id.to_string()],
    )?;
    Ok(changed)
}

/// All leaves for a doctor, most recent start first.
pub fn leaves_for_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Leave>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM leaves WHERE doctor_id = ?1 ORDER BY start_date DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], row_to_parts)?;
    collect_leaves(rows)
}

/// Pending leaves across a facility, oldest start first: the admin
/// collaborator's review queue.
pub fn pending_for_facility(
    conn: &Connection,
    facility_id: &Uuid,
) -> Result<Vec<Leave>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM leaves
         WHERE facility_id = ?1 AND status = 'pending'
         ORDER BY start_date ASC"
    ))?;
    let rows = stmt.query_map(params![facility_id.to_string()], row_to_parts)?;
    collect_leaves(rows)
}

struct LeaveRow {
    id: String,
    doctor_id: String,
    facility_id: String,
    kind: String,
    reason: String,
    start_date: String,
    end_date: String,
    status: String,
}

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeaveRow> {
    Ok(LeaveRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        facility_id: row.get(2)?,
        kind: row.get(3)?,
        reason: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        status: row.get(7)?,
    })
}

fn leave_from_row(row: LeaveRow) -> Result<Leave, DatabaseError> {
    Ok(Leave {
        id: uuid_from_db(&row.id)?,
        doctor_id: uuid_from_db(&row.doctor_id)?,
        facility_id: uuid_from_db(&row.facility_id)?,
        kind: LeaveKind::from_str(&row.kind)?,
        reason: row.reason,
        start_date: date_from_db(&row.start_date)?,
        end_date: date_from_db(&row.end_date)?,
        status: LeaveStatus::from_str(&row.status)?,
    })
}

fn collect_leaves(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<LeaveRow>>,
) -> Result<Vec<Leave>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(leave_from_row(row?)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::doctor::insert_doctor;
    use crate::models::Doctor;
    use chrono::NaiveDate;

    fn seed_doctor(conn: &Connection) -> (Uuid, Uuid) {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Chen".into(),
            facility_id: Uuid::new_v4(),
            department: "General".into(),
        };
        insert_doctor(conn, &doctor).unwrap();
        (doctor.id, doctor.facility_id)
    }

    fn make_leave(doctor_id: Uuid, facility_id: Uuid) -> Leave {
        Leave {
            id: Uuid::new_v4(),
            doctor_id,
            facility_id,
            kind: LeaveKind::Sick,
            reason: "flu".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
            status: LeaveStatus::Pending,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let (doctor_id, facility_id) = seed_doctor(&conn);
        let leave = make_leave(doctor_id, facility_id);
        insert_leave(&conn, &leave).unwrap();

        let fetched = get_leave(&conn, &leave.id).unwrap().unwrap();
        assert_eq!(fetched.kind, LeaveKind::Sick);
        assert_eq!(fetched.status, LeaveStatus::Pending);
        assert_eq!(fetched.start_date, leave.start_date);
    }

    #[test]
    fn pending_exists_tracks_status() {
        let conn = open_memory_database().unwrap();
        let (doctor_id, facility_id) = seed_doctor(&conn);
        assert!(!pending_exists(&conn, &doctor_id).unwrap());

        let leave = make_leave(doctor_id, facility_id);
        insert_leave(&conn, &leave).unwrap();
        assert!(pending_exists(&conn, &doctor_id).unwrap());

        set_status_if_pending(&conn, &leave.id, LeaveStatus::Rejected).unwrap();
        assert!(!pending_exists(&conn, &doctor_id).unwrap());
    }

    #[test]
    fn decision_is_exactly_once() {
        let conn = open_memory_database().unwrap();
        let (doctor_id, facility_id) = seed_doctor(&conn);
        let leave = make_leave(doctor_id, facility_id);
        insert_leave(&conn, &leave).unwrap();

        assert_eq!(set_status_if_pending(&conn, &leave.id, LeaveStatus::Approved).unwrap(), 1);
        assert_eq!(set_status_if_pending(&conn, &leave.id, LeaveStatus::Rejected).unwrap(), 0);

        let fetched = get_leave(&conn, &leave.id).unwrap().unwrap();
        assert_eq!(fetched.status, LeaveStatus::Approved);
    }

    #[test]
    fn approved_leave_covers_its_inclusive_range_only() {
        let conn = open_memory_database().unwrap();
        let (doctor_id, facility_id) = seed_doctor(&conn);
        let leave = make_leave(doctor_id, facility_id);
        insert_leave(&conn, &leave).unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2025, 4, d).unwrap();

        // Pending leaves do not cover anything
        assert!(!approved_leave_covers(&conn, &doctor_id, day(2)).unwrap());

        set_status_if_pending(&conn, &leave.id, LeaveStatus::Approved).unwrap();
        assert!(approved_leave_covers(&conn, &doctor_id, day(1)).unwrap());
        assert!(approved_leave_covers(&conn, &doctor_id, day(2)).unwrap());
        assert!(approved_leave_covers(&conn, &doctor_id, day(3)).unwrap());
        assert!(!approved_leave_covers(&conn, &doctor_id, day(4)).unwrap());
        assert!(!approved_leave_covers(&conn, &Uuid::new_v4(), day(2)).unwrap());
    }

    #[test]
    fn facility_review_queue_lists_pending_only() {
        let conn = open_memory_database().unwrap();
        let (doctor_id, facility_id) = seed_doctor(&conn);

        let mut first = make_leave(doctor_id, facility_id);
        first.start_date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        first.end_date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let second = make_leave(doctor_id, facility_id);
        insert_leave(&conn, &first).unwrap();
        insert_leave(&conn, &second).unwrap();
        set_status_if_pending(&conn, &first.id, LeaveStatus::Rejected).unwrap();

        let queue = pending_for_facility(&conn, &facility_id).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, second.id);

        let all = leaves_for_doctor(&conn, &doctor_id).unwrap();
        assert_eq!(all.len(), 2);
        // Most recent start first
        assert_eq!(all[0].id, second.id);
    }
}
