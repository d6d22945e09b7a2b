//! Reporting layer: on-demand roll-ups over appointments, payments, and
//! accounts. Every call fetches the filtered rows and folds them in
//! memory — there is no incremental state to invalidate.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::config::STAFF_PERIOD_CAPACITY;
use crate::db::{self, DatabaseError};
use crate::models::*;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid report window: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct LabelAmount {
    pub label: String,
    pub amount: f64,
}

// ── Dashboard ───────────────────────────────────────────────

/// Role-aware dashboard counts. Fields that do not apply to the caller's
/// role stay `None` and are omitted from the response.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub today_appointments: u32,
    pub upcoming_appointments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_patients: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_doctors: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_payments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_active_records: Option<u32>,
}

pub fn dashboard_stats(
    conn: &Connection,
    actor: &Actor,
    today: NaiveDate,
) -> Result<DashboardStats, ReportError> {
    let scope = |filter: AppointmentFilter| -> AppointmentFilter {
        match actor.role {
            UserRole::Patient => AppointmentFilter {
                patient_id: Some(actor.id),
                ..filter
            },
            UserRole::Doctor => AppointmentFilter {
                doctor_id: Some(actor.id),
                ..filter
            },
            _ => filter,
        }
    };

    let todays = db::list_appointments(
        conn,
        &scope(AppointmentFilter {
            date_from: Some(today),
            date_to: Some(today),
            ..Default::default()
        }),
    )?;
    let upcoming = db::list_appointments(
        conn,
        &scope(AppointmentFilter {
            date_from: Some(today),
            ..Default::default()
        }),
    )?;
    let count_active =
        |items: &[Appointment]| items.iter().filter(|a| a.is_active()).count() as u32;

    let mut stats = DashboardStats {
        today_appointments: count_active(&todays),
        upcoming_appointments: count_active(&upcoming),
        total_patients: None,
        total_doctors: None,
        pending_payments: None,
        my_active_records: None,
    };

    match actor.role {
        UserRole::Patient => {
            let records = db::list_records(
                conn,
                &RecordFilter {
                    patient_id: Some(actor.id),
                    record_type: None,
                },
            )?;
            stats.my_active_records = Some(records.len() as u32);
        }
        UserRole::Staff | UserRole::Manager | UserRole::Admin => {
            stats.total_patients =
                Some(db::list_users_by_role(conn, UserRole::Patient)?.len() as u32);
            stats.total_doctors = Some(db::list_users_by_role(conn, UserRole::Doctor)?.len() as u32);
            let pending = db::list_payments(conn, &PaymentFilter::default())?
                .iter()
                .filter(|p| p.status == PaymentStatus::Pending)
                .count() as u32;
            stats.pending_payments = Some(pending);
        }
        UserRole::Doctor => {}
    }

    Ok(stats)
}

// ── Appointment report ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AppointmentReport {
    pub window: (NaiveDate, NaiveDate),
    pub total: u32,
    pub by_day: Vec<DayCount>,
    pub by_status: Vec<LabelCount>,
    pub by_doctor: Vec<LabelCount>,
    pub by_department: Vec<LabelCount>,
}

fn check_window(window: &ReportWindow) -> Result<(), ReportError> {
    if window.from > window.to {
        return Err(ReportError::Validation(
            "window start is after window end".into(),
        ));
    }
    Ok(())
}

/// Doctor id → (display name, department) lookup shared by reports.
fn doctor_directory(
    conn: &Connection,
) -> Result<HashMap<Uuid, (String, String)>, DatabaseError> {
    let doctors = db::list_users_by_role(conn, UserRole::Doctor)?;
    Ok(doctors
        .into_iter()
        .map(|d| {
            let dept = d
                .profile
                .department()
                .unwrap_or("Unassigned")
                .to_string();
            (d.id, (d.full_name(), dept))
        })
        .collect())
}

pub fn appointment_report(
    conn: &Connection,
    window: ReportWindow,
) -> Result<AppointmentReport, ReportError> {
    check_window(&window)?;
    let rows = db::appointment_report_rows(conn, window.from, window.to)?;
    let doctors = doctor_directory(conn)?;

    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut by_status: BTreeMap<&'static str, u32> = BTreeMap::new();
    let mut by_doctor: BTreeMap<String, u32> = BTreeMap::new();
    let mut by_department: BTreeMap<String, u32> = BTreeMap::new();

    for (date, status, doctor_id) in &rows {
        *by_day.entry(*date).or_default() += 1;
        *by_status.entry(status.as_str()).or_default() += 1;
        let (name, dept) = doctors
            .get(doctor_id)
            .cloned()
            .unwrap_or_else(|| ("Unknown".into(), "Unassigned".into()));
        *by_doctor.entry(name).or_default() += 1;
        *by_department.entry(dept).or_default() += 1;
    }

    Ok(AppointmentReport {
        window: (window.from, window.to),
        total: rows.len() as u32,
        by_day: by_day
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
        by_status: label_counts(by_status),
        by_doctor: label_counts(by_doctor),
        by_department: label_counts(by_department),
    })
}

fn label_counts<K: ToString>(map: BTreeMap<K, u32>) -> Vec<LabelCount> {
    map.into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect()
}

// ── Revenue report ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RevenueReport {
    pub window: (NaiveDate, NaiveDate),
    pub payment_count: u32,
    pub total_amount: f64,
    pub average_payment: f64,
    pub by_day: Vec<LabelAmount>,
    pub by_method: Vec<LabelAmount>,
    pub by_status: Vec<LabelAmount>,
}

pub fn revenue_report(
    conn: &Connection,
    window: ReportWindow,
) -> Result<RevenueReport, ReportError> {
    check_window(&window)?;
    let payments = db::list_payments(
        conn,
        &PaymentFilter {
            date_from: Some(window.from),
            date_to: Some(window.to),
            ..Default::default()
        },
    )?;

    let mut by_day: BTreeMap<String, f64> = BTreeMap::new();
    let mut by_method: BTreeMap<&'static str, f64> = BTreeMap::new();
    let mut by_status: BTreeMap<&'static str, f64> = BTreeMap::new();
    let mut total = 0.0;

    for p in &payments {
        total += p.amount;
        *by_day.entry(p.created_at.date().to_string()).or_default() += p.amount;
        *by_method.entry(p.method.as_str()).or_default() += p.amount;
        *by_status.entry(p.status.as_str()).or_default() += p.amount;
    }

    let count = payments.len() as u32;
    Ok(RevenueReport {
        window: (window.from, window.to),
        payment_count: count,
        total_amount: total,
        average_payment: if count == 0 { 0.0 } else { total / f64::from(count) },
        by_day: label_amounts(by_day),
        by_method: label_amounts(by_method),
        by_status: label_amounts(by_status),
    })
}

fn label_amounts<K: ToString>(map: BTreeMap<K, f64>) -> Vec<LabelAmount> {
    map.into_iter()
        .map(|(label, amount)| LabelAmount {
            label: label.to_string(),
            amount,
        })
        .collect()
}

// ── User report (admin only, gated at the API) ──────────────

#[derive(Debug, Serialize)]
pub struct UserReport {
    pub total_users: u32,
    pub active_users: u32,
    pub inactive_users: u32,
    pub by_role: Vec<LabelCount>,
    pub registrations_by_month: Vec<LabelCount>,
}

pub fn user_report(conn: &Connection) -> Result<UserReport, ReportError> {
    let mut by_role: BTreeMap<&'static str, u32> = BTreeMap::new();
    let mut by_month: BTreeMap<String, u32> = BTreeMap::new();
    let mut total = 0u32;
    let mut active = 0u32;

    for role in [
        UserRole::Patient,
        UserRole::Doctor,
        UserRole::Staff,
        UserRole::Manager,
        UserRole::Admin,
    ] {
        let users = db::list_users_by_role(conn, role)?;
        by_role.insert(role.as_str(), users.len() as u32);
        for user in &users {
            total += 1;
            if user.is_active {
                active += 1;
            }
            let month = format!("{:04}-{:02}", user.created_at.year(), user.created_at.month());
            *by_month.entry(month).or_default() += 1;
        }
    }

    Ok(UserReport {
        total_users: total,
        active_users: active,
        inactive_users: total - active,
        by_role: label_counts(by_role),
        registrations_by_month: label_counts(by_month),
    })
}

// ── Manager reports ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ManagerOverview {
    pub total_patients: u32,
    pub total_doctors: u32,
    pub total_staff: u32,
    pub todays_appointments: u32,
    pub pending_payment_amount: f64,
    pub collected_this_month: f64,
}

pub fn manager_overview(
    conn: &Connection,
    today: NaiveDate,
) -> Result<ManagerOverview, ReportError> {
    let todays = db::list_appointments(
        conn,
        &AppointmentFilter {
            date_from: Some(today),
            date_to: Some(today),
            ..Default::default()
        },
    )?;

    let payments = db::list_payments(conn, &PaymentFilter::default())?;
    let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .unwrap_or(today);
    let pending: f64 = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Pending)
        .map(|p| p.amount)
        .sum();
    let collected: f64 = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed && p.created_at.date() >= month_start)
        .map(|p| p.amount)
        .sum();

    Ok(ManagerOverview {
        total_patients: db::list_users_by_role(conn, UserRole::Patient)?.len() as u32,
        total_doctors: db::list_users_by_role(conn, UserRole::Doctor)?.len() as u32,
        total_staff: db::list_users_by_role(conn, UserRole::Staff)?.len() as u32,
        todays_appointments: todays.iter().filter(|a| a.is_active()).count() as u32,
        pending_payment_amount: pending,
        collected_this_month: collected,
    })
}

#[derive(Debug, Serialize)]
pub struct PatientVisitReport {
    pub window: (NaiveDate, NaiveDate),
    pub total_visits: u32,
    pub unique_patients: u32,
    pub by_day: Vec<DayCount>,
    pub by_department: Vec<LabelCount>,
}

/// Visits are completed appointments inside the window.
pub fn patient_visit_report(
    conn: &Connection,
    window: ReportWindow,
) -> Result<PatientVisitReport, ReportError> {
    check_window(&window)?;
    let appointments = db::list_appointments(
        conn,
        &AppointmentFilter {
            date_from: Some(window.from),
            date_to: Some(window.to),
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        },
    )?;
    let doctors = doctor_directory(conn)?;

    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut by_department: BTreeMap<String, u32> = BTreeMap::new();
    let mut patients: HashSet<Uuid> = HashSet::new();

    for a in &appointments {
        *by_day.entry(a.date).or_default() += 1;
        let dept = doctors
            .get(&a.doctor_id)
            .map(|(_, d)| d.clone())
            .unwrap_or_else(|| "Unassigned".into());
        *by_department.entry(dept).or_default() += 1;
        patients.insert(a.patient_id);
    }

    Ok(PatientVisitReport {
        window: (window.from, window.to),
        total_visits: appointments.len() as u32,
        unique_patients: patients.len() as u32,
        by_day: by_day
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
        by_department: label_counts(by_department),
    })
}

#[derive(Debug, Serialize)]
pub struct StaffUtilization {
    pub staff_id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub appointment_count: u32,
    pub utilization_percent: u32,
}

/// Utilization against the fixed per-period capacity, capped at 100.
pub fn utilization_percent(appointment_count: u32) -> u32 {
    let raw = (f64::from(appointment_count) / f64::from(STAFF_PERIOD_CAPACITY) * 100.0).round();
    (raw as u32).min(100)
}

pub fn staff_utilization_report(
    conn: &Connection,
    window: ReportWindow,
) -> Result<Vec<StaffUtilization>, ReportError> {
    check_window(&window)?;
    let rows = db::appointment_report_rows(conn, window.from, window.to)?;
    let mut counts: HashMap<Uuid, u32> = HashMap::new();
    for (_, status, doctor_id) in &rows {
        if *status != AppointmentStatus::Cancelled {
            *counts.entry(*doctor_id).or_default() += 1;
        }
    }

    let mut report: Vec<StaffUtilization> = db::list_users_by_role(conn, UserRole::Doctor)?
        .into_iter()
        .map(|d| {
            let count = counts.get(&d.id).copied().unwrap_or(0);
            StaffUtilization {
                staff_id: d.id,
                name: d.full_name(),
                department: d.profile.department().map(str::to_string),
                appointment_count: count,
                utilization_percent: utilization_percent(count),
            }
        })
        .collect();
    report.sort_by(|a, b| b.appointment_count.cmp(&a.appointment_count));
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct FinancialReport {
    pub window: (NaiveDate, NaiveDate),
    pub collected: f64,
    pub pending: f64,
    pub refunded: f64,
    pub by_method: Vec<LabelAmount>,
}

pub fn financial_report(
    conn: &Connection,
    window: ReportWindow,
) -> Result<FinancialReport, ReportError> {
    check_window(&window)?;
    let payments = db::list_payments(
        conn,
        &PaymentFilter {
            date_from: Some(window.from),
            date_to: Some(window.to),
            ..Default::default()
        },
    )?;

    let sum_where = |status: PaymentStatus| -> f64 {
        payments
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.amount)
            .sum()
    };
    let mut by_method: BTreeMap<&'static str, f64> = BTreeMap::new();
    for p in payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
    {
        *by_method.entry(p.method.as_str()).or_default() += p.amount;
    }

    Ok(FinancialReport {
        window: (window.from, window.to),
        collected: sum_where(PaymentStatus::Completed),
        pending: sum_where(PaymentStatus::Pending),
        refunded: sum_where(PaymentStatus::Refunded),
        by_method: label_amounts(by_method),
    })
}
