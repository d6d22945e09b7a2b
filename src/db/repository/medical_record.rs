use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const RECORD_COLUMNS: &str = "id, patient_id, doctor_id, appointment_id, created_by, record_type, \
     title, diagnosis, prescriptions, lab_results, vitals, notes, status, version, \
     created_at, updated_at";

pub fn insert_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, patient_id, doctor_id, appointment_id, created_by,
                                      record_type, title, diagnosis, prescriptions, lab_results,
                                      vitals, notes, status, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.doctor_id.map(|id| id.to_string()),
            record.appointment_id.map(|id| id.to_string()),
            record.created_by.to_string(),
            record.record_type.as_str(),
            record.title,
            record.diagnosis,
            serde_json::to_string(&record.prescriptions)?,
            serde_json::to_string(&record.lab_results)?,
            record
                .vitals
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            record.notes,
            record.status.as_str(),
            record.version,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

/// Fetch a record regardless of status; soft-delete visibility is a service
/// concern, not a storage one.
pub fn get_record(conn: &Connection, id: &Uuid) -> Result<Option<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE id = ?1"
    ))?;
    stmt.query_row(params![id.to_string()], map_record_row)
        .optional()?
        .map(record_from_raw)
        .transpose()
}

/// Persist a mutated record; bumps nothing itself — the caller sets version
/// and updated_at.
pub fn update_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medical_records
         SET title = ?1, diagnosis = ?2, prescriptions = ?3, lab_results = ?4, vitals = ?5,
             notes = ?6, status = ?7, version = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            record.title,
            record.diagnosis,
            serde_json::to_string(&record.prescriptions)?,
            serde_json::to_string(&record.lab_results)?,
            record
                .vitals
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            record.notes,
            record.status.as_str(),
            record.version,
            record.updated_at,
            record.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medical_record".into(),
            id: record.id.to_string(),
        });
    }
    Ok(())
}

/// Active records matching the filter, newest first.
pub fn list_records(
    conn: &Connection,
    filter: &RecordFilter,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM medical_records WHERE status = 'active'");
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(patient_id) = filter.patient_id {
        args.push(Box::new(patient_id.to_string()));
        sql.push_str(&format!(" AND patient_id = ?{}", args.len()));
    }
    if let Some(record_type) = filter.record_type {
        args.push(Box::new(record_type.as_str()));
        sql.push_str(&format!(" AND record_type = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        map_record_row,
    )?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(record_from_raw))
        .collect()
}

// ── Version snapshots ───────────────────────────────────────

pub fn insert_record_version(
    conn: &Connection,
    record: &MedicalRecord,
    modified_by: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO record_versions (id, record_id, version, snapshot, modified_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            record.id.to_string(),
            record.version,
            serde_json::to_string(record)?,
            modified_by.to_string(),
            chrono::Utc::now().naive_utc(),
        ],
    )?;
    Ok(())
}

pub fn list_record_versions(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<Vec<RecordVersion>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, version, snapshot, modified_by, created_at
         FROM record_versions WHERE record_id = ?1 ORDER BY version",
    )?;
    let rows = stmt.query_map(params![record_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, chrono::NaiveDateTime>(5)?,
        ))
    })?;
    rows.map(|r| {
        let (id, record_id, version, snapshot, modified_by, created_at) = r?;
        Ok(RecordVersion {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            record_id: Uuid::parse_str(&record_id).unwrap_or_default(),
            version,
            snapshot: serde_json::from_str(&snapshot)?,
            modified_by: Uuid::parse_str(&modified_by).unwrap_or_default(),
            created_at,
        })
    })
    .collect()
}

// ── Row mapping ─────────────────────────────────────────────

struct RecordRaw {
    id: String,
    patient_id: String,
    doctor_id: Option<String>,
    appointment_id: Option<String>,
    created_by: String,
    record_type: String,
    title: String,
    diagnosis: Option<String>,
    prescriptions: String,
    lab_results: String,
    vitals: Option<String>,
    notes: Option<String>,
    status: String,
    version: i64,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRaw> {
    Ok(RecordRaw {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        created_by: row.get(4)?,
        record_type: row.get(5)?,
        title: row.get(6)?,
        diagnosis: row.get(7)?,
        prescriptions: row.get(8)?,
        lab_results: row.get(9)?,
        vitals: row.get(10)?,
        notes: row.get(11)?,
        status: row.get(12)?,
        version: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn record_from_raw(r: RecordRaw) -> Result<MedicalRecord, DatabaseError> {
    Ok(MedicalRecord {
        id: Uuid::parse_str(&r.id).unwrap_or_default(),
        patient_id: Uuid::parse_str(&r.patient_id).unwrap_or_default(),
        doctor_id: r.doctor_id.and_then(|s| Uuid::parse_str(&s).ok()),
        appointment_id: r.appointment_id.and_then(|s| Uuid::parse_str(&s).ok()),
        created_by: Uuid::parse_str(&r.created_by).unwrap_or_default(),
        record_type: r.record_type.parse()?,
        title: r.title,
        diagnosis: r.diagnosis,
        prescriptions: serde_json::from_str(&r.prescriptions)?,
        lab_results: serde_json::from_str(&r.lab_results)?,
        vitals: r.vitals.map(|v| serde_json::from_str(&v)).transpose()?,
        notes: r.notes,
        status: r.status.parse()?,
        version: r.version,
        created_at: r.created_at,
        updated_at: r.updated_at,
    })
}
