use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RecordStatus, RecordType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub temperature_c: Option<f64>,
    pub respiratory_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
}

/// A clinical document belonging to exactly one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub created_by: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub diagnosis: Option<String>,
    pub prescriptions: Vec<Prescription>,
    pub lab_results: Vec<LabResult>,
    pub vitals: Option<Vitals>,
    pub notes: Option<String>,
    pub status: RecordStatus,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Snapshot of a record taken before a mutation was applied.
#[derive(Debug, Clone, Serialize)]
pub struct RecordVersion {
    pub id: Uuid,
    pub record_id: Uuid,
    pub version: i64,
    pub snapshot: MedicalRecord,
    pub modified_by: Uuid,
    pub created_at: NaiveDateTime,
}

/// Fields a caller may change on an existing record. `None` leaves the
/// current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub diagnosis: Option<String>,
    pub prescriptions: Option<Vec<Prescription>>,
    pub lab_results: Option<Vec<LabResult>>,
    pub vitals: Option<Vitals>,
    pub notes: Option<String>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.diagnosis.is_none()
            && self.prescriptions.is_none()
            && self.lab_results.is_none()
            && self.vitals.is_none()
            && self.notes.is_none()
    }
}
