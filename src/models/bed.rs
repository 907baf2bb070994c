use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BedType;

/// Physical bed in a facility's pool. Created in batches by the
/// administrative collaborator; `available` is the only field this core
/// mutates, and only through guarded writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub bed_type: BedType,
    pub price_per_night: f64,
    pub available: bool,
}

/// Reservation of a bed for a date range. Kept forever as historical
/// record; releasing the bed is a separate explicit operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedBooking {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub bed_id: Uuid,
    pub facility_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Snapshot of the bed's availability at booking time.
    pub bed_was_available: bool,
    pub created_at: NaiveDateTime,
}
