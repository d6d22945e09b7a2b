//! Appointment scheduling: booking with conflict detection, status
//! lifecycle, and doctor availability.
//!
//! Two bookings conflict when their half-open intervals share any time on
//! the same date; back-to-back slots do not. The conflict check and the
//! insert run inside one immediate transaction, so two concurrent booking
//! attempts serialize at the database and the loser sees the winner's row.

use chrono::{NaiveDate, NaiveTime, Timelike};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DEFAULT_SLOT_MINUTES, WORK_DAY_END_MINUTE, WORK_DAY_START_MINUTE};
use crate::db::{self, DatabaseError};
use crate::models::*;

const MIN_DURATION_MINUTES: u16 = 5;
const MAX_DURATION_MINUTES: u16 = 240;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("The requested slot is unavailable")]
    SlotUnavailable,

    #[error("Appointment not found")]
    NotFound,

    #[error("Unknown doctor")]
    UnknownDoctor,

    #[error("Unknown patient")]
    UnknownPatient,

    #[error("Invalid booking request: {0}")]
    Validation(String),

    #[error("Cannot move appointment from {from:?} to {to:?}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
    pub reason: Option<String>,
}

/// Whether two half-open minute intervals share any time.
fn overlaps(a_start: u16, a_end: u16, b_start: u16, b_end: u16) -> bool {
    a_start < b_end && b_start < a_end
}

/// Book an appointment. Fails with [`ScheduleError::SlotUnavailable`] when
/// any non-cancelled appointment for the doctor overlaps the request.
pub fn book_appointment(
    conn: &mut Connection,
    request: &BookingRequest,
    created_by: Option<Uuid>,
) -> Result<Appointment, ScheduleError> {
    if request.duration_minutes < MIN_DURATION_MINUTES
        || request.duration_minutes > MAX_DURATION_MINUTES
    {
        return Err(ScheduleError::Validation(format!(
            "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )));
    }

    let doctor = db::get_user(conn, &request.doctor_id)?.ok_or(ScheduleError::UnknownDoctor)?;
    if doctor.role() != UserRole::Doctor || !doctor.is_active {
        return Err(ScheduleError::UnknownDoctor);
    }
    let patient = db::get_user(conn, &request.patient_id)?.ok_or(ScheduleError::UnknownPatient)?;
    if patient.role() != UserRole::Patient {
        return Err(ScheduleError::UnknownPatient);
    }

    let new_start = (request.start_time.hour() * 60 + request.start_time.minute()) as u16;
    let new_end = new_start + request.duration_minutes;

    // Check-then-insert must be atomic with respect to other bookings.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;

    let existing = db::active_appointments_for_doctor_on(&tx, &request.doctor_id, request.date)?;
    if existing
        .iter()
        .any(|a| overlaps(new_start, new_end, a.start_minute(), a.end_minute()))
    {
        return Err(ScheduleError::SlotUnavailable);
    }

    let now = chrono::Utc::now().naive_utc();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        doctor_id: request.doctor_id,
        date: request.date,
        start_time: request.start_time,
        duration_minutes: request.duration_minutes,
        status: AppointmentStatus::Scheduled,
        reason: request.reason.clone(),
        notes: None,
        created_by,
        created_at: now,
        updated_at: now,
    };
    db::insert_appointment(&tx, &appointment)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        date = %appointment.date,
        "appointment booked"
    );
    Ok(appointment)
}

/// Lifecycle rule: forward-only through scheduled → confirmed →
/// in-progress → completed, with cancellation open from any non-terminal
/// state.
pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    use AppointmentStatus::*;
    if from.is_terminal() {
        return false;
    }
    match to {
        Cancelled => true,
        Confirmed => from == Scheduled,
        InProgress => matches!(from, Scheduled | Confirmed),
        Completed => matches!(from, Confirmed | InProgress),
        Scheduled => false,
    }
}

pub fn change_status(
    conn: &Connection,
    id: &Uuid,
    to: AppointmentStatus,
) -> Result<Appointment, ScheduleError> {
    let appointment = db::get_appointment(conn, id)?.ok_or(ScheduleError::NotFound)?;
    if !can_transition(appointment.status, to) {
        return Err(ScheduleError::InvalidTransition {
            from: appointment.status,
            to,
        });
    }
    db::update_appointment_status(conn, id, to)?;
    Ok(db::get_appointment(conn, id)?.ok_or(ScheduleError::NotFound)?)
}

/// Free slots for a doctor on a date: the working-day grid minus booked
/// intervals.
pub fn availability(
    conn: &Connection,
    doctor_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<AvailabilitySlot>, ScheduleError> {
    let doctor = db::get_user(conn, doctor_id)?.ok_or(ScheduleError::UnknownDoctor)?;
    if doctor.role() != UserRole::Doctor {
        return Err(ScheduleError::UnknownDoctor);
    }

    let booked: Vec<(u16, u16)> = db::active_appointments_for_doctor_on(conn, doctor_id, date)?
        .iter()
        .map(|a| (a.start_minute(), a.end_minute()))
        .collect();

    let mut slots = Vec::new();
    let mut start = WORK_DAY_START_MINUTE;
    while start + DEFAULT_SLOT_MINUTES <= WORK_DAY_END_MINUTE {
        let end = start + DEFAULT_SLOT_MINUTES;
        if !booked.iter().any(|&(bs, be)| overlaps(start, end, bs, be)) {
            slots.push(AvailabilitySlot {
                start_time: NaiveTime::from_hms_opt(u32::from(start) / 60, u32::from(start) % 60, 0)
                    .unwrap_or_default(),
                duration_minutes: DEFAULT_SLOT_MINUTES,
            });
        }
        start = end;
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::NaiveDateTime;

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    fn seed_doctor(conn: &Connection, email: &str) -> Uuid {
        let mut user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "x".into(),
            first_name: "Greg".into(),
            last_name: "House".into(),
            phone: None,
            is_active: true,
            email_verified: true,
            profile: RoleProfile::Doctor {
                specialization: "Diagnostics".into(),
                consultation_fee: 200.0,
                department: None,
            },
            created_at: now(),
            updated_at: now(),
        };
        db::insert_user(conn, &mut user).unwrap();
        user.id
    }

    fn seed_patient(conn: &Connection, email: &str) -> Uuid {
        let mut user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "x".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: None,
            is_active: true,
            email_verified: true,
            profile: RoleProfile::Patient {
                date_of_birth: NaiveDate::from_ymd_opt(1992, 7, 4).unwrap(),
                blood_type: "O-".into(),
                health_card_id: None,
            },
            created_at: now(),
            updated_at: now(),
        };
        db::insert_user(conn, &mut user).unwrap();
        user.id
    }

    fn booking(
        patient: Uuid,
        doctor: Uuid,
        date: NaiveDate,
        time: (u32, u32),
        duration: u16,
    ) -> BookingRequest {
        BookingRequest {
            patient_id: patient,
            doctor_id: doctor,
            date,
            start_time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            duration_minutes: duration,
            reason: None,
        }
    }

    #[test]
    fn overlap_rules() {
        // Shared sub-interval conflicts
        assert!(overlaps(600, 630, 615, 645));
        assert!(overlaps(615, 645, 600, 630));
        // Containment conflicts
        assert!(overlaps(600, 660, 615, 630));
        // Back-to-back does not
        assert!(!overlaps(600, 630, 630, 660));
        assert!(!overlaps(630, 660, 600, 630));
        // Disjoint does not
        assert!(!overlaps(600, 630, 700, 730));
    }

    #[test]
    fn booking_scenario_overlap_rejected_back_to_back_accepted() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        // 10:00 for 30 minutes
        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();

        // 10:15 overlaps → rejected
        let err = book_appointment(&mut conn, &booking(patient, doctor, date, (10, 15), 30), None)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::SlotUnavailable));

        // 10:30 back-to-back → accepted
        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 30), 30), None).unwrap();
    }

    #[test]
    fn exact_duplicate_slot_rejected() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();
        let err = book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::SlotUnavailable));
    }

    #[test]
    fn cancelled_slot_can_be_rebooked() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let appt =
            book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();
        change_status(&conn, &appt.id, AppointmentStatus::Cancelled).unwrap();

        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();
    }

    #[test]
    fn other_doctor_same_slot_is_fine() {
        let mut conn = open_memory_database().unwrap();
        let doctor_a = seed_doctor(&conn, "a@x.com");
        let doctor_b = seed_doctor(&conn, "b@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        book_appointment(&mut conn, &booking(patient, doctor_a, date, (10, 0), 30), None).unwrap();
        book_appointment(&mut conn, &booking(patient, doctor_b, date, (10, 0), 30), None).unwrap();
    }

    #[test]
    fn booking_validates_duration_and_participants() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let err = book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 0), None)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));

        let err =
            book_appointment(&mut conn, &booking(patient, Uuid::new_v4(), date, (10, 0), 30), None)
                .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownDoctor));

        // A doctor cannot stand in as the patient
        let err = book_appointment(&mut conn, &booking(doctor, doctor, date, (10, 0), 30), None)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownPatient));
    }

    #[test]
    fn status_lifecycle() {
        use AppointmentStatus::*;
        assert!(can_transition(Scheduled, Confirmed));
        assert!(can_transition(Confirmed, InProgress));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(Scheduled, Cancelled));
        assert!(can_transition(InProgress, Cancelled));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Scheduled));
        assert!(!can_transition(Completed, InProgress));
        assert!(!can_transition(InProgress, Confirmed));
    }

    #[test]
    fn change_status_round_trip() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let appt =
            book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();
        let confirmed = change_status(&conn, &appt.id, AppointmentStatus::Confirmed).unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

        let err = change_status(&conn, &appt.id, AppointmentStatus::Scheduled).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));
    }

    #[test]
    fn availability_excludes_booked_slots() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let open = availability(&conn, &doctor, date).unwrap();
        // 9:00–17:00 in 30-minute slots
        assert_eq!(open.len(), 16);

        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 0), 30), None).unwrap();
        let open = availability(&conn, &doctor, date).unwrap();
        assert_eq!(open.len(), 15);
        assert!(!open
            .iter()
            .any(|s| s.start_time == NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
    }

    #[test]
    fn availability_handles_off_grid_bookings() {
        let mut conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn, "d@x.com");
        let patient = seed_patient(&conn, "jane@x.com");
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        // 10:15 for 30 minutes blocks both the 10:00 and 10:30 grid slots
        book_appointment(&mut conn, &booking(patient, doctor, date, (10, 15), 30), None).unwrap();
        let open = availability(&conn, &doctor, date).unwrap();
        assert_eq!(open.len(), 14);
    }
}
