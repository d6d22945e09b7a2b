use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Start of the booked interval, minutes since midnight.
    pub fn start_minute(&self) -> u16 {
        (self.start_time.hour() * 60 + self.start_time.minute()) as u16
    }

    /// End of the booked interval (exclusive), minutes since midnight.
    pub fn end_minute(&self) -> u16 {
        self.start_minute() + self.duration_minutes
    }

    /// An appointment counts toward conflicts and reports unless cancelled.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// Appointment joined with participant names, for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
}

/// A bookable slot in a doctor's day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilitySlot {
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
}
