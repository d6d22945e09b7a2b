//! Medical record service: create, read, update, soft delete, and the
//! per-patient summary.
//!
//! Every access that reaches authorization appends exactly one audit entry,
//! denied attempts included. Mutations snapshot the prior state into
//! `record_versions` before anything changes.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::{self, Actor, Capability};
use crate::db::{self, DatabaseError, NewAuditEntry};
use crate::models::*;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Medical record not found")]
    NotFound,

    #[error("Access to this record is not permitted")]
    Forbidden,

    #[error("Invalid record payload: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordRequest {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub record_type: RecordType,
    pub title: String,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub lab_results: Vec<LabResult>,
    pub vitals: Option<Vitals>,
    pub notes: Option<String>,
}

/// Active records for one patient, grouped for the summary endpoint.
#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub health_card_id: Option<String>,
    pub total_records: usize,
    pub counts_by_type: Vec<TypeCount>,
    pub latest_diagnosis: Option<String>,
    pub active_prescriptions: Vec<Prescription>,
}

#[derive(Debug, Serialize)]
pub struct TypeCount {
    pub record_type: RecordType,
    pub count: usize,
}

fn audit(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    action: AuditAction,
    resource: AuditResource,
    resource_id: &str,
    outcome: AuditOutcome,
) -> Result<(), DatabaseError> {
    db::append_audit(
        conn,
        &NewAuditEntry {
            actor_id: actor.id,
            actor_role: actor.role,
            action,
            resource,
            resource_id: resource_id.to_string(),
            outcome,
            client: client.clone(),
        },
    )?;
    Ok(())
}

/// Read access: the owning patient, a treating doctor, or staff/admin.
fn may_read(conn: &Connection, actor: &Actor, record: &MedicalRecord) -> Result<bool, DatabaseError> {
    match actor.role {
        UserRole::Staff | UserRole::Admin => Ok(true),
        UserRole::Patient => Ok(record.patient_id == actor.id),
        UserRole::Doctor => {
            if record.doctor_id == Some(actor.id) || record.created_by == actor.id {
                return Ok(true);
            }
            db::doctor_treats_patient(conn, &actor.id, &record.patient_id)
        }
        UserRole::Manager => Ok(false),
    }
}

/// Write access: the creator, the assigned doctor, or an admin.
fn may_update(actor: &Actor, record: &MedicalRecord) -> bool {
    actor.role == UserRole::Admin
        || record.created_by == actor.id
        || record.doctor_id == Some(actor.id)
}

pub fn create_record(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    request: CreateRecordRequest,
) -> Result<MedicalRecord, RecordError> {
    if authorization::require(actor.role, Capability::CreateRecord).is_err() {
        audit(
            conn,
            actor,
            client,
            AuditAction::Create,
            AuditResource::MedicalRecord,
            &request.patient_id.to_string(),
            AuditOutcome::Denied,
        )?;
        return Err(RecordError::Forbidden);
    }
    if request.title.trim().is_empty() {
        return Err(RecordError::Validation("Title is required".into()));
    }
    let patient = db::get_user(conn, &request.patient_id)?
        .filter(|u| u.role() == UserRole::Patient)
        .ok_or(RecordError::Validation("Unknown patient".into()))?;

    let now = chrono::Utc::now().naive_utc();
    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: request.doctor_id,
        appointment_id: request.appointment_id,
        created_by: actor.id,
        record_type: request.record_type,
        title: request.title.trim().to_string(),
        diagnosis: request.diagnosis,
        prescriptions: request.prescriptions,
        lab_results: request.lab_results,
        vitals: request.vitals,
        notes: request.notes,
        status: RecordStatus::Active,
        version: 1,
        created_at: now,
        updated_at: now,
    };
    db::insert_record(conn, &record)?;
    audit(
        conn,
        actor,
        client,
        AuditAction::Create,
        AuditResource::MedicalRecord,
        &record.id.to_string(),
        AuditOutcome::Success,
    )?;
    tracing::info!(record_id = %record.id, patient_id = %record.patient_id, "medical record created");
    Ok(record)
}

pub fn read_record(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    id: &Uuid,
) -> Result<MedicalRecord, RecordError> {
    let record = db::get_record(conn, id)?.ok_or(RecordError::NotFound)?;
    if record.status == RecordStatus::Deleted {
        return Err(RecordError::NotFound);
    }
    if !may_read(conn, actor, &record)? {
        audit(
            conn,
            actor,
            client,
            AuditAction::Read,
            AuditResource::MedicalRecord,
            &id.to_string(),
            AuditOutcome::Denied,
        )?;
        return Err(RecordError::Forbidden);
    }
    audit(
        conn,
        actor,
        client,
        AuditAction::Read,
        AuditResource::MedicalRecord,
        &id.to_string(),
        AuditOutcome::Success,
    )?;
    Ok(record)
}

pub fn update_record(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    id: &Uuid,
    changes: RecordUpdate,
) -> Result<MedicalRecord, RecordError> {
    let mut record = db::get_record(conn, id)?.ok_or(RecordError::NotFound)?;
    if record.status == RecordStatus::Deleted {
        return Err(RecordError::NotFound);
    }
    if !may_update(actor, &record) {
        audit(
            conn,
            actor,
            client,
            AuditAction::Update,
            AuditResource::MedicalRecord,
            &id.to_string(),
            AuditOutcome::Denied,
        )?;
        return Err(RecordError::Forbidden);
    }
    if changes.is_empty() {
        return Err(RecordError::Validation("No changes supplied".into()));
    }
    if matches!(&changes.title, Some(t) if t.trim().is_empty()) {
        return Err(RecordError::Validation("Title cannot be empty".into()));
    }

    // Snapshot the current state before touching it
    db::insert_record_version(conn, &record, &actor.id)?;

    if let Some(title) = changes.title {
        record.title = title.trim().to_string();
    }
    if let Some(diagnosis) = changes.diagnosis {
        record.diagnosis = Some(diagnosis);
    }
    if let Some(prescriptions) = changes.prescriptions {
        record.prescriptions = prescriptions;
    }
    if let Some(lab_results) = changes.lab_results {
        record.lab_results = lab_results;
    }
    if let Some(vitals) = changes.vitals {
        record.vitals = Some(vitals);
    }
    if let Some(notes) = changes.notes {
        record.notes = Some(notes);
    }
    record.version += 1;
    record.updated_at = chrono::Utc::now().naive_utc();
    db::update_record(conn, &record)?;

    audit(
        conn,
        actor,
        client,
        AuditAction::Update,
        AuditResource::MedicalRecord,
        &id.to_string(),
        AuditOutcome::Success,
    )?;
    Ok(record)
}

/// Soft delete (admin only): the record stays in storage with status
/// `deleted` and disappears from reads and listings.
pub fn delete_record(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    id: &Uuid,
) -> Result<(), RecordError> {
    let mut record = db::get_record(conn, id)?.ok_or(RecordError::NotFound)?;
    if record.status == RecordStatus::Deleted {
        return Err(RecordError::NotFound);
    }
    if authorization::require(actor.role, Capability::DeleteRecord).is_err() {
        audit(
            conn,
            actor,
            client,
            AuditAction::SoftDelete,
            AuditResource::MedicalRecord,
            &id.to_string(),
            AuditOutcome::Denied,
        )?;
        return Err(RecordError::Forbidden);
    }

    db::insert_record_version(conn, &record, &actor.id)?;
    record.status = RecordStatus::Deleted;
    record.version += 1;
    record.updated_at = chrono::Utc::now().naive_utc();
    db::update_record(conn, &record)?;

    audit(
        conn,
        actor,
        client,
        AuditAction::SoftDelete,
        AuditResource::MedicalRecord,
        &id.to_string(),
        AuditOutcome::Success,
    )?;
    tracing::info!(record_id = %id, "medical record soft-deleted");
    Ok(())
}

/// Role-scoped listing. Patients see their own records; doctors must scope
/// to a patient they treat; staff/admin may list freely.
pub fn list_records(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    mut filter: RecordFilter,
) -> Result<Vec<MedicalRecord>, RecordError> {
    match actor.role {
        UserRole::Patient => filter.patient_id = Some(actor.id),
        UserRole::Doctor => {
            let patient_id = filter.patient_id.ok_or(RecordError::Forbidden)?;
            if !db::doctor_treats_patient(conn, &actor.id, &patient_id)? {
                audit(
                    conn,
                    actor,
                    client,
                    AuditAction::List,
                    AuditResource::PatientProfile,
                    &patient_id.to_string(),
                    AuditOutcome::Denied,
                )?;
                return Err(RecordError::Forbidden);
            }
        }
        UserRole::Staff | UserRole::Admin => {}
        UserRole::Manager => return Err(RecordError::Forbidden),
    }

    let records = db::list_records(conn, &filter)?;
    if let Some(patient_id) = filter.patient_id {
        audit(
            conn,
            actor,
            client,
            AuditAction::List,
            AuditResource::PatientProfile,
            &patient_id.to_string(),
            AuditOutcome::Success,
        )?;
    }
    Ok(records)
}

pub fn patient_summary(
    conn: &Connection,
    actor: &Actor,
    client: &ClientMeta,
    patient_id: &Uuid,
) -> Result<PatientSummary, RecordError> {
    let patient = db::get_user(conn, patient_id)?
        .filter(|u| u.role() == UserRole::Patient)
        .ok_or(RecordError::NotFound)?;

    let permitted = match actor.role {
        UserRole::Staff | UserRole::Admin => true,
        UserRole::Patient => actor.id == *patient_id,
        UserRole::Doctor => db::doctor_treats_patient(conn, &actor.id, patient_id)?,
        UserRole::Manager => false,
    };
    if !permitted {
        audit(
            conn,
            actor,
            client,
            AuditAction::Read,
            AuditResource::PatientProfile,
            &patient_id.to_string(),
            AuditOutcome::Denied,
        )?;
        return Err(RecordError::Forbidden);
    }

    let records = db::list_records(
        conn,
        &RecordFilter {
            patient_id: Some(*patient_id),
            record_type: None,
        },
    )?;

    let mut counts: Vec<TypeCount> = Vec::new();
    for record in &records {
        match counts.iter_mut().find(|c| c.record_type == record.record_type) {
            Some(entry) => entry.count += 1,
            None => counts.push(TypeCount {
                record_type: record.record_type,
                count: 1,
            }),
        }
    }

    let latest_diagnosis = records.iter().find_map(|r| r.diagnosis.clone());
    let active_prescriptions = records
        .iter()
        .flat_map(|r| r.prescriptions.iter().cloned())
        .collect();

    audit(
        conn,
        actor,
        client,
        AuditAction::Read,
        AuditResource::PatientProfile,
        &patient_id.to_string(),
        AuditOutcome::Success,
    )?;

    Ok(PatientSummary {
        patient_id: *patient_id,
        patient_name: patient.full_name(),
        health_card_id: patient.profile.health_card_id().map(str::to_string),
        total_records: records.len(),
        counts_by_type: counts,
        latest_diagnosis,
        active_prescriptions,
    })
}
