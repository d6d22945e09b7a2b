use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, date, start_time, duration_minutes, \
     status, reason, notes, created_by, created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, date, start_time,
                                   duration_minutes, status, reason, notes, created_by,
                                   created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date,
            appt.start_time,
            appt.duration_minutes,
            appt.status.as_str(),
            appt.reason,
            appt.notes,
            appt.created_by.map(|id| id.to_string()),
            appt.created_at,
            appt.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;
    let appt = stmt
        .query_row(params![id.to_string()], map_appointment_row)
        .optional()?;
    Ok(appt)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            status.as_str(),
            chrono::Utc::now().naive_utc(),
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// All non-cancelled appointments for one doctor on one date — the conflict
/// candidates for a booking attempt.
pub fn active_appointments_for_doctor_on(
    conn: &Connection,
    doctor_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE doctor_id = ?1 AND date = ?2 AND status != 'cancelled'
         ORDER BY start_time"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string(), date], map_appointment_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Filtered listing. Filters compose with AND; absent fields match all.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE 1=1");
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(from) = filter.date_from {
        args.push(Box::new(from));
        sql.push_str(&format!(" AND date >= ?{}", args.len()));
    }
    if let Some(to) = filter.date_to {
        args.push(Box::new(to));
        sql.push_str(&format!(" AND date <= ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    if let Some(doctor_id) = filter.doctor_id {
        args.push(Box::new(doctor_id.to_string()));
        sql.push_str(&format!(" AND doctor_id = ?{}", args.len()));
    }
    if let Some(patient_id) = filter.patient_id {
        args.push(Box::new(patient_id.to_string()));
        sql.push_str(&format!(" AND patient_id = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY date, start_time");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        map_appointment_row,
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Listing joined with participant names.
pub fn list_appointment_views(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    let appointments = list_appointments(conn, filter)?;
    appointments
        .into_iter()
        .map(|appt| {
            let patient_name = user_display_name(conn, &appt.patient_id)?;
            let doctor_name = user_display_name(conn, &appt.doctor_id)?;
            Ok(AppointmentView {
                appointment: appt,
                patient_name,
                doctor_name,
            })
        })
        .collect()
}

fn user_display_name(conn: &Connection, id: &Uuid) -> Result<String, DatabaseError> {
    let name = conn
        .query_row(
            "SELECT first_name || ' ' || last_name FROM users WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(name.unwrap_or_else(|| "Unknown".into()))
}

/// Upcoming (today or later, not cancelled) appointment count for a patient.
pub fn count_upcoming_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
    today: NaiveDate,
) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE patient_id = ?1 AND date >= ?2 AND status != 'cancelled'",
        params![patient_id.to_string(), today],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Whether a doctor and patient share any appointment — the treating
/// relationship used by record authorization.
pub fn doctor_treats_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let related: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM appointments
                       WHERE doctor_id = ?1 AND patient_id = ?2 AND status != 'cancelled')",
        params![doctor_id.to_string(), patient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(related)
}

fn map_appointment_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
        patient_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_default(),
        doctor_id: Uuid::parse_str(&row.get::<_, String>(2)?).unwrap_or_default(),
        date: row.get(3)?,
        start_time: row.get(4)?,
        duration_minutes: row.get(5)?,
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(AppointmentStatus::Scheduled),
        reason: row.get(7)?,
        notes: row.get(8)?,
        created_by: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Fetch minimal rows for reporting windows: (date, status, doctor_id).
pub fn appointment_report_rows(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<(NaiveDate, AppointmentStatus, Uuid)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT date, status, doctor_id FROM appointments
         WHERE date >= ?1 AND date <= ?2",
    )?;
    let rows = stmt.query_map(params![from, to], |row| {
        Ok((
            row.get::<_, NaiveDate>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    rows.map(|r| {
        let (date, status, doctor) = r?;
        Ok((
            date,
            status.parse().unwrap_or(AppointmentStatus::Scheduled),
            Uuid::parse_str(&doctor).unwrap_or_default(),
        ))
    })
    .collect()
}
