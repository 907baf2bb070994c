use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{date_from_db, datetime_from_db, datetime_to_db, uuid_from_db};
use crate::db::DatabaseError;
use crate::models::{Bed, BedBooking, BedType};

const BED_COLUMNS: &str = "id, facility_id, bed_type, price_per_night, available";
const BOOKING_COLUMNS: &str =
    "id, patient_id, bed_id, facility_id, start_date, end_date, bed_was_available, created_at";

pub fn insert_bed(conn: &Connection, bed: &Bed) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO beds (id, facility_id, bed_type, price_per_night, available)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bed.id.to_string(),
            bed.facility_id.to_string(),
            bed.bed_type.as_str(),
            bed.price_per_night,
            bed.available as i32,
        ],
    )?;
    Ok(())
}

pub fn get_bed(conn: &Connection, id: &Uuid) -> Result<Option<Bed>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {BED_COLUMNS} FROM beds WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], bed_row_to_parts);
    match result {
        Ok(row) => Ok(Some(bed_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List beds, optionally narrowed by facility and/or type, optionally to
/// available ones only. Stable order by type then id.
pub fn list_beds(
    conn: &Connection,
    facility_id: Option<&Uuid>,
    bed_type: Option<BedType>,
    available_only: bool,
) -> Result<Vec<Bed>, DatabaseError> {
    let mut sql = format!("SELECT {BED_COLUMNS} FROM beds WHERE 1=1");
    let mut args: Vec<String> = Vec::new();

    if let Some(facility_id) = facility_id {
        args.push(facility_id.to_string());
        sql.push_str(&format!(" AND facility_id = ?{}", args.len()));
    }
    if let Some(bed_type) = bed_type {
        args.push(bed_type.as_str().to_string());
        sql.push_str(&format!(" AND bed_type = ?{}", args.len()));
    }
    if available_only {
        sql.push_str(" AND available = 1");
    }
    sql.push_str(" ORDER BY bed_type ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), bed_row_to_parts)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(bed_from_row(row?)?);
    }
    Ok(out)
}

/// Compare-and-swap claim: flips `available` 1 → 0 and reports whether this
/// caller won the flag. Two concurrent claims cannot both return true; the
/// storage engine serializes the guarded UPDATE.
pub fn claim_bed(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE beds SET available = 0 WHERE id = ?1 AND available = 1",
        params![id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Set `available` back to 1. Returns false when no such bed exists.
pub fn release_bed(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE beds SET available = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(changed == 1)
}

pub fn insert_bed_booking(conn: &Connection, booking: &BedBooking) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bed_bookings (id, patient_id, bed_id, facility_id, start_date, end_date,
         bed_was_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            booking.id.to_string(),
            booking.patient_id.to_string(),
            booking.bed_id.to_string(),
            booking.facility_id.to_string(),
            booking.start_date.to_string(),
            booking.end_date.to_string(),
            booking.bed_was_available as i32,
            datetime_to_db(&booking.created_at),
        ],
    )?;
    Ok(())
}

/// Full booking history for a bed, newest first. Nothing is ever deleted.
pub fn bookings_for_bed(conn: &Connection, bed_id: &Uuid) -> Result<Vec<BedBooking>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bed_bookings WHERE bed_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![bed_id.to_string()], booking_row_to_parts)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(booking_from_row(row?)?);
    }
    Ok(out)
}

pub fn count_bookings_for_bed(conn: &Connection, bed_id: &Uuid) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bed_bookings WHERE bed_id = ?1",
        params![bed_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

struct BedRow {
    id: String,
    facility_id: String,
    bed_type: String,
    price_per_night: f64,
    available: i32,
}

fn bed_row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<BedRow> {
    Ok(BedRow {
        id: row.get(0)?,
        facility_id: row.get(1)?,
        bed_type: row.get(2)?,
        price_per_night: row.get(3)?,
        available: row.get(4)?,
    })
}

fn bed_from_row(row: BedRow) -> Result<Bed, DatabaseError> {
    Ok(Bed {
        id: uuid_from_db(&row.id)?,
        facility_id: uuid_from_db(&row.facility_id)?,
        bed_type: BedType::from_str(&row.bed_type)?,
        price_per_night: row.price_per_night,
        available: row.available != 0,
    })
}

struct BookingRow {
    id: String,
    patient_id: String,
    bed_id: String,
    facility_id: String,
    start_date: String,
    end_date: String,
    bed_was_available: i32,
    created_at: String,
}

fn booking_row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        bed_id: row.get(2)?,
        facility_id: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        bed_was_available: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn booking_from_row(row: BookingRow) -> Result<BedBooking, DatabaseError> {
    Ok(BedBooking {
        id: uuid_from_db(&row.id)?,
        patient_id: uuid_from_db(&row.patient_id)?,
        bed_id: uuid_from_db(&row.bed_id)?,
        facility_id: uuid_from_db(&row.facility_id)?,
        start_date: date_from_db(&row.start_date)?,
        end_date: date_from_db(&row.end_date)?,
        bed_was_available: row.bed_was_available != 0,
        created_at: datetime_from_db(&row.created_at)?,
    })
}
