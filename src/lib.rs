//! Medrota: appointment scheduling and bed allocation for outpatient
//! facilities.
//!
//! The crate is a library core. Callers hand it a [`rusqlite::Connection`]
//! opened through [`db::open_database`] and drive the managers directly:
//!
//! - [`calendar`] generates the fixed 20-minute slot grid per working day
//! - [`availability`] resolves a doctor's free slots against booked work
//! - [`booking`] books, cancels, reschedules and completes appointments
//! - [`leave`] handles leave requests and the approval cascade
//! - [`beds`] manages the typed bed pool and reservations
//!
//! Write-time conflicts (double bookings, concurrent bed claims) are decided
//! by the storage layer, so correctness does not depend on process-wide
//! locks.

pub mod availability;
pub mod beds;
pub mod booking;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod invoice;
pub mod leave;
pub mod models;

pub use error::SchedulingError;
