//! Bed inventory manager: a fixed pool of typed beds per facility with
//! reservation semantics.
//!
//! `reserve` claims the bed's availability flag with a compare-and-swap at
//! the storage layer, then records the booking; two concurrent reserves
//! cannot both win. `release` is a separate explicit operation: no
//! automatic flip-back is wired to booking cancellation (open product
//! question, see DESIGN notes).

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repository::bed as bed_repo;
use crate::db::DatabaseError;
use crate::error::SchedulingError;
use crate::invoice::{InvoiceNotice, InvoiceSink, PaymentKind};
use crate::models::{Bed, BedBooking, BedType};

#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub patient_id: Uuid,
    pub bed_id: Uuid,
    pub facility_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Occupancy counters for one bed type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeOccupancy {
    pub total: u64,
    pub available: u64,
}

/// Aggregate occupancy. `by_type` always carries every known type, so
/// consumers never need missing-key handling.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BedStatistics {
    pub total: u64,
    pub available: u64,
    pub by_type: BTreeMap<BedType, TypeOccupancy>,
}

/// All beds, optionally narrowed by facility and/or type.
pub fn list_beds(
    conn: &Connection,
    facility_id: Option<&Uuid>,
    bed_type: Option<BedType>,
) -> Result<Vec<Bed>, SchedulingError> {
    Ok(bed_repo::list_beds(conn, facility_id, bed_type, false)?)
}

/// Beds of a type currently open for reservation.
pub fn available_beds(
    conn: &Connection,
    bed_type: BedType,
    facility_id: Option<&Uuid>,
) -> Result<Vec<Bed>, SchedulingError> {
    Ok(bed_repo::list_beds(conn, facility_id, Some(bed_type), true)?)
}

/// Claim the bed and record the booking as one logical unit: both writes
/// commit in a single transaction, so a failure between them leaves the
/// flag untouched. The CAS on the availability flag decides concurrent
/// attempts; on a lost race this fails with `BedUnavailable` and writes
/// nothing.
pub fn reserve(
    conn: &Connection,
    req: &ReservationRequest,
    invoices: &dyn InvoiceSink,
) -> Result<BedBooking, SchedulingError> {
    if req.start_date > req.end_date {
        return Err(SchedulingError::Validation(format!(
            "reservation start {} is after end {}",
            req.start_date, req.end_date
        )));
    }

    let bed = bed_repo::get_bed(conn, &req.bed_id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: "Bed".into(),
        id: req.bed_id.to_string(),
    })?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

    if !bed_repo::claim_bed(&tx, &req.bed_id)? {
        warn!(bed_id = %req.bed_id, "bed already claimed");
        return Err(SchedulingError::BedUnavailable { bed_id: req.bed_id });
    }

    let booking = BedBooking {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        bed_id: req.bed_id,
        facility_id: req.facility_id,
        start_date: req.start_date,
        end_date: req.end_date,
        bed_was_available: true,
        created_at: Local::now().naive_local(),
    };
    bed_repo::insert_bed_booking(&tx, &booking)?;
    tx.commit().map_err(DatabaseError::from)?;
    info!(booking_id = %booking.id, bed_id = %booking.bed_id,
          start = %booking.start_date, end = %booking.end_date, "bed reserved");

    invoices.notify(InvoiceNotice {
        patient_id: req.patient_id,
        reference_id: booking.id,
        amount: bed.price_per_night * nights(req.start_date, req.end_date) as f64,
        kind: PaymentKind::BedReservation,
    });

    Ok(booking)
}

/// Make the bed reservable again. Idempotent; prior bookings stay on
/// record.
pub fn release(conn: &Connection, bed_id: &Uuid) -> Result<(), SchedulingError> {
    if !bed_repo::release_bed(conn, bed_id)? {
        return Err(SchedulingError::NotFound {
            entity_type: "Bed".into(),
            id: bed_id.to_string(),
        });
    }
    info!(bed_id = %bed_id, "bed released");
    Ok(())
}

/// Booking history for a bed, newest first.
pub fn booking_history(
    conn: &Connection,
    bed_id: &Uuid,
) -> Result<Vec<BedBooking>, SchedulingError> {
    Ok(bed_repo::bookings_for_bed(conn, bed_id)?)
}

/// Occupancy aggregation over the current bed set. Every known type is
/// present in `by_type`, zeroed when the pool has none of it.
pub fn statistics(
    conn: &Connection,
    facility_id: Option<&Uuid>,
) -> Result<BedStatistics, SchedulingError> {
    let beds = bed_repo::list_beds(conn, facility_id, None, false)?;

    let mut by_type: BTreeMap<BedType, TypeOccupancy> =
        BedType::ALL.iter().map(|t| (*t, TypeOccupancy::default())).collect();
    let mut stats = BedStatistics { total: 0, available: 0, by_type: BTreeMap::new() };

    for bed in &beds {
        stats.total += 1;
        let entry = by_type.entry(bed.bed_type).or_default();
        entry.total += 1;
        if bed.available {
            stats.available += 1;
            entry.available += 1;
        }
    }

    stats.by_type = by_type;
    Ok(stats)
}

fn nights(start: NaiveDate, end: NaiveDate) -> i64 {
    // A same-day stay still bills one night.
    (end - start).num_days().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::bed::insert_bed;
    use crate::invoice::{NullInvoiceSink, RecordingInvoiceSink};

    fn seed_bed(conn: &Connection, facility_id: Uuid, bed_type: BedType, price: f64) -> Uuid {
        let bed = Bed {
            id: Uuid::new_v4(),
            facility_id,
            bed_type,
            price_per_night: price,
            available: true,
        };
        insert_bed(conn, &bed).unwrap();
        bed.id
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn request(bed_id: Uuid, facility_id: Uuid) -> ReservationRequest {
        ReservationRequest {
            patient_id: Uuid::new_v4(),
            bed_id,
            facility_id,
            start_date: date(1),
            end_date: date(4),
        }
    }

    #[test]
    fn reserve_flips_availability_and_snapshots_it() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::General, 100.0);

        let booking = reserve(&conn, &request(bed_id, facility_id), &NullInvoiceSink).unwrap();
        assert!(booking.bed_was_available);

        let bed = bed_repo::get_bed(&conn, &bed_id).unwrap().unwrap();
        assert!(!bed.available);
    }

    #[test]
    fn reserve_on_unavailable_bed_fails_without_side_effects() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::Icu, 250.0);

        reserve(&conn, &request(bed_id, facility_id), &NullInvoiceSink).unwrap();
        let err = reserve(&conn, &request(bed_id, facility_id), &NullInvoiceSink).unwrap_err();
        assert!(matches!(err, SchedulingError::BedUnavailable { .. }));

        // No second BedBooking was written
        assert_eq!(bed_repo::count_bookings_for_bed(&conn, &bed_id).unwrap(), 1);
    }

    #[test]
    fn reserve_missing_bed_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = reserve(
            &conn,
            &request(Uuid::new_v4(), Uuid::new_v4()),
            &NullInvoiceSink,
        )
        .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn reserve_rejects_inverted_range() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::General, 100.0);

        let mut req = request(bed_id, facility_id);
        req.start_date = date(5);
        req.end_date = date(2);
        let err = reserve(&conn, &req, &NullInvoiceSink).unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }

    #[test]
    fn release_reopens_the_bed_and_keeps_history() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::Personal, 400.0);

        reserve(&conn, &request(bed_id, facility_id), &NullInvoiceSink).unwrap();
        release(&conn, &bed_id).unwrap();

        let bed = bed_repo::get_bed(&conn, &bed_id).unwrap().unwrap();
        assert!(bed.available);
        assert_eq!(booking_history(&conn, &bed_id).unwrap().len(), 1);

        // Reservable again after release
        reserve(&conn, &request(bed_id, facility_id), &NullInvoiceSink).unwrap();
        assert_eq!(booking_history(&conn, &bed_id).unwrap().len(), 2);
    }

    #[test]
    fn release_missing_bed_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = release(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn invoice_notified_with_price_times_nights() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::Icu, 250.0);
        let sink = RecordingInvoiceSink::default();

        // Three nights: 2025-04-01 .. 2025-04-04
        let booking = reserve(&conn, &request(bed_id, facility_id), &sink).unwrap();

        let notices = sink.taken();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reference_id, booking.id);
        assert_eq!(notices[0].amount, 750.0);
        assert_eq!(notices[0].kind, PaymentKind::BedReservation);
    }

    #[test]
    fn same_day_stay_bills_one_night() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let bed_id = seed_bed(&conn, facility_id, BedType::General, 100.0);
        let sink = RecordingInvoiceSink::default();

        let mut req = request(bed_id, facility_id);
        req.end_date = req.start_date;
        reserve(&conn, &req, &sink).unwrap();
        assert_eq!(sink.taken()[0].amount, 100.0);
    }

    #[test]
    fn statistics_counts_by_type_with_zero_defaults() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();

        // 2 ICU beds, 1 reserved; no personal beds at all
        let icu_a = seed_bed(&conn, facility_id, BedType::Icu, 250.0);
        seed_bed(&conn, facility_id, BedType::Icu, 250.0);
        seed_bed(&conn, facility_id, BedType::General, 100.0);
        reserve(&conn, &request(icu_a, facility_id), &NullInvoiceSink).unwrap();

        let stats = statistics(&conn, Some(&facility_id)).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.available, 2);

        let icu = stats.by_type[&BedType::Icu];
        assert_eq!(icu, TypeOccupancy { total: 2, available: 1 });
        let general = stats.by_type[&BedType::General];
        assert_eq!(general, TypeOccupancy { total: 1, available: 1 });
        // Absent type still present, zeroed
        let personal = stats.by_type[&BedType::Personal];
        assert_eq!(personal, TypeOccupancy::default());
        assert_eq!(stats.by_type.len(), BedType::ALL.len());
    }

    #[test]
    fn statistics_serialize_with_every_type_present() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        seed_bed(&conn, facility_id, BedType::General, 100.0);

        let stats = statistics(&conn, Some(&facility_id)).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["by_type"]["General"]["available"], 1);
        assert_eq!(json["by_type"]["Icu"]["total"], 0);
        assert_eq!(json["by_type"]["Personal"]["total"], 0);
    }

    #[test]
    fn statistics_scope_by_facility() {
        let conn = open_memory_database().unwrap();
        let facility_a = Uuid::new_v4();
        let facility_b = Uuid::new_v4();
        seed_bed(&conn, facility_a, BedType::General, 100.0);
        seed_bed(&conn, facility_b, BedType::General, 100.0);

        assert_eq!(statistics(&conn, Some(&facility_a)).unwrap().total, 1);
        assert_eq!(statistics(&conn, None).unwrap().total, 2);
    }

    #[test]
    fn listings_filter_as_expected() {
        let conn = open_memory_database().unwrap();
        let facility_id = Uuid::new_v4();
        let icu = seed_bed(&conn, facility_id, BedType::Icu, 250.0);
        seed_bed(&conn, facility_id, BedType::General, 100.0);
        reserve(&conn, &request(icu, facility_id), &NullInvoiceSink).unwrap();

        assert_eq!(list_beds(&conn, Some(&facility_id), None).unwrap().len(), 2);
        assert_eq!(
            list_beds(&conn, Some(&facility_id), Some(BedType::Icu)).unwrap().len(),
            1
        );
        assert!(available_beds(&conn, BedType::Icu, Some(&facility_id)).unwrap().is_empty());
        assert_eq!(
            available_beds(&conn, BedType::General, Some(&facility_id)).unwrap().len(),
            1
        );
    }
}
