use rusqlite::{params, Connection};
use uuid::Uuid;

use super::uuid_from_db;
use crate::db::DatabaseError;
use crate::models::Doctor;

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, facility_id, department)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.facility_id.to_string(),
            doctor.department,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, facility_id, department FROM doctors WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    });

    match result {
        Ok((id, name, facility_id, department)) => Ok(Some(Doctor {
            id: uuid_from_db(&id)?,
            name,
            facility_id: uuid_from_db(&facility_id)?,
            department,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn insert_and_get_doctor() {
        let conn = open_memory_database().unwrap();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Rao".into(),
            facility_id: Uuid::new_v4(),
            department: "Cardiology".into(),
        };
        insert_doctor(&conn, &doctor).unwrap();

        let fetched = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Dr. Rao");
        assert_eq!(fetched.facility_id, doctor.facility_id);
    }

    #[test]
    fn get_missing_doctor_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_doctor(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
