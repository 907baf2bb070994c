use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{LeaveKind, LeaveStatus};

/// Absence request for a doctor. Date-granularity, inclusive range.
/// Status is decided exactly once by the administrative collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leave {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    pub kind: LeaveKind,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
}
