//! Leave manager: applications, decisions, and the cancellation cascade.
//!
//! Approving a leave cancels every scheduled appointment whose slot falls
//! inside the leave window. The leave decision and the cascade are not one
//! transaction, so per-appointment failures are reported instead of rolled
//! back. Each individual cancellation is atomic with its own status write.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::booking;
use crate::config::LeavePolicy;
use crate::db::repository::{doctor, leave as leave_repo};
use crate::error::SchedulingError;
use crate::models::{Leave, LeaveKind, LeaveStatus};

#[derive(Debug, Clone)]
pub struct LeaveRequest {
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    pub kind: LeaveKind,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    Approve,
    Reject,
}

/// What happened to each affected appointment during an approval cascade.
#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub cancelled: Vec<Uuid>,
    pub failed: Vec<CascadeFailure>,
}

#[derive(Debug, Clone)]
pub struct CascadeFailure {
    pub appointment_id: Uuid,
    pub error: String,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    Approved { leave: Leave, cascade: CascadeReport },
    Rejected(Leave),
}

/// File a leave request. Validates the date range and, when the policy
/// asks for it, rejects a second pending leave for the same doctor.
pub fn apply(
    conn: &Connection,
    req: &LeaveRequest,
    policy: &LeavePolicy,
) -> Result<Leave, SchedulingError> {
    if req.start_date > req.end_date {
        return Err(SchedulingError::Validation(format!(
            "leave start {} is after end {}",
            req.start_date, req.end_date
        )));
    }

    doctor::get_doctor(conn, &req.doctor_id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Doctor".into(),
        id: req.doctor_id.to_string(),
    })?;

    if policy.single_pending && leave_repo::pending_exists(conn, &req.doctor_id)? {
        return Err(SchedulingError::Validation(
            "doctor already has a pending leave".into(),
        ));
    }

    let leave = Leave {
        id: Uuid::new_v4(),
        doctor_id: req.doctor_id,
        facility_id: req.facility_id,
        kind: req.kind,
        reason: req.reason.clone(),
        start_date: req.start_date,
        end_date: req.end_date,
        status: LeaveStatus::Pending,
    };
    leave_repo::insert_leave(conn, &leave)?;
    info!(leave_id = %leave.id, doctor_id = %leave.doctor_id,
          start = %leave.start_date, end = %leave.end_date, "leave applied");
    Ok(leave)
}

/// How many scheduled appointments an approval over this window would
/// cancel. A read for confirmation prompts; the cascade re-enumerates.
pub fn affected_count(
    conn: &Connection,
    doctor_id: &Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<u64, SchedulingError> {
    let (from, to) = window_bounds(start_date, end_date);
    Ok(crate::db::repository::appointment::count_scheduled_between(
        conn, doctor_id, &from, &to,
    )?)
}

/// Decide a pending leave. The status flip is a guarded write, so a leave
/// is decided exactly once; on approval the cancellation cascade runs.
pub fn decide(
    conn: &Connection,
    leave_id: &Uuid,
    decision: LeaveDecision,
) -> Result<DecisionOutcome, SchedulingError> {
    let status = match decision {
        LeaveDecision::Approve => LeaveStatus::Approved,
        LeaveDecision::Reject => LeaveStatus::Rejected,
    };

    if leave_repo::set_status_if_pending(conn, leave_id, status)? == 0 {
        let leave =
            leave_repo::get_leave(conn, leave_id)?.ok_or_else(|| SchedulingError::NotFound {
                entity_type: "Leave".into(),
                id: leave_id.to_string(),
            })?;
        return Err(SchedulingError::InvalidTransition {
            entity_type: "Leave".into(),
            id: leave_id.to_string(),
            status: leave.status.as_str().into(),
        });
    }

    let leave = leave_repo::get_leave(conn, leave_id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Leave".into(),
        id: leave_id.to_string(),
    })?;
    info!(leave_id = %leave_id, decision = ?decision, "leave decided");

    match decision {
        LeaveDecision::Reject => Ok(DecisionOutcome::Rejected(leave)),
        LeaveDecision::Approve => {
            let cascade = run_cascade(conn, &leave)?;
            Ok(DecisionOutcome::Approved { leave, cascade })
        }
    }
}

/// Enumerate-then-cancel pipeline. Cancellations already committed stay
/// committed whatever happens to the rest.
fn run_cascade(conn: &Connection, leave: &Leave) -> Result<CascadeReport, SchedulingError> {
    let (from, to) = window_bounds(leave.start_date, leave.end_date);
    let affected =
        crate::db::repository::appointment::scheduled_between(conn, &leave.doctor_id, &from, &to)?;

    let mut report = CascadeReport::default();
    for appt in affected {
        match booking::cancel(conn, &appt.id) {
            Ok(_) => report.cancelled.push(appt.id),
            Err(e) => {
                warn!(appointment_id = %appt.id, error = %e, "cascade cancellation failed");
                report.failed.push(CascadeFailure {
                    appointment_id: appt.id,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(leave_id = %leave.id, cancelled = report.cancelled.len(),
          failed = report.failed.len(), "leave cascade finished");
    Ok(report)
}

/// Inclusive date range → half-open instant range covering whole days.
fn window_bounds(start_date: NaiveDate, end_date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let from = start_date.and_time(NaiveTime::MIN);
    let to = end_date.and_time(NaiveTime::MIN) + Duration::days(1);
    (from, to)
}

/// All leaves for a doctor, most recent first.
pub fn leaves_for_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Leave>, SchedulingError> {
    Ok(leave_repo::leaves_for_doctor(conn, doctor_id)?)
}

/// Pending leaves awaiting decision across a facility.
pub fn pending_for_facility(
    conn: &Connection,
    facility_id: &Uuid,
) -> Result<Vec<Leave>, SchedulingError> {
    Ok(leave_repo::pending_for_facility(conn, facility_id)?)
}
