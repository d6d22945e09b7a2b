use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::enums::{AppointmentStatus, PaymentMethod, RecordType};

/// Filter for appointment listings. All fields optional; role scoping is
/// applied by the service on top of this.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub patient_id: Option<Uuid>,
    pub record_type: Option<RecordType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub patient_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Inclusive date window for the reporting layer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReportWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}
