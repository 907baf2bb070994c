pub mod appointment;
pub mod bed;
pub mod doctor;
pub mod leave;

use chrono::{NaiveDate, NaiveDateTime};

use super::DatabaseError;

/// Canonical TEXT encoding for instants. Lexicographic order matches
/// chronological order, so range predicates work directly in SQL.
pub(crate) fn datetime_to_db(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn datetime_from_db(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad datetime {s:?}: {e}")))
}

pub(crate) fn date_from_db(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad date {s:?}: {e}")))
}

pub(crate) fn uuid_from_db(s: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn datetime_round_trip() {
        let dt = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(9, 20, 0)
            .unwrap();
        let s = datetime_to_db(&dt);
        assert_eq!(s, "2025-04-01 09:20:00");
        assert_eq!(datetime_from_db(&s).unwrap(), dt);
    }

    #[test]
    fn datetime_accepts_iso_t_separator() {
        let dt = datetime_from_db("2025-04-01T09:20:00").unwrap();
        assert_eq!(datetime_to_db(&dt), "2025-04-01 09:20:00");
    }

    #[test]
    fn bad_datetime_rejected() {
        assert!(datetime_from_db("yesterday").is_err());
    }
}
