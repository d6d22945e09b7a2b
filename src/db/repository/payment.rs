use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const PAYMENT_COLUMNS: &str =
    "id, patient_id, appointment_id, amount, method, status, description, created_at, updated_at";

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO payments (id, patient_id, appointment_id, amount, method, status,
                               description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            payment.id.to_string(),
            payment.patient_id.to_string(),
            payment.appointment_id.map(|id| id.to_string()),
            payment.amount,
            payment.method.as_str(),
            payment.status.as_str(),
            payment.description,
            payment.created_at,
            payment.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, id: &Uuid) -> Result<Option<Payment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
    ))?;
    let payment = stmt
        .query_row(params![id.to_string()], map_payment_row)
        .optional()?;
    Ok(payment)
}

pub fn update_payment_status(
    conn: &Connection,
    id: &Uuid,
    status: PaymentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            status.as_str(),
            chrono::Utc::now().naive_utc(),
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "payment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_payments(
    conn: &Connection,
    filter: &PaymentFilter,
) -> Result<Vec<Payment>, DatabaseError> {
    let mut sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1=1");
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(patient_id) = filter.patient_id {
        args.push(Box::new(patient_id.to_string()));
        sql.push_str(&format!(" AND patient_id = ?{}", args.len()));
    }
    if let Some(method) = filter.method {
        args.push(Box::new(method.as_str()));
        sql.push_str(&format!(" AND method = ?{}", args.len()));
    }
    if let Some(from) = filter.date_from {
        args.push(Box::new(from.and_hms_opt(0, 0, 0).unwrap_or_default()));
        sql.push_str(&format!(" AND created_at >= ?{}", args.len()));
    }
    if let Some(to) = filter.date_to {
        args.push(Box::new(to.and_hms_opt(23, 59, 59).unwrap_or_default()));
        sql.push_str(&format!(" AND created_at <= ?{}", args.len()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        map_payment_row,
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn map_payment_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
        patient_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_default(),
        appointment_id: row
            .get::<_, Option<String>>(2)?
            .and_then(|s| Uuid::parse_str(&s).ok()),
        amount: row.get(3)?,
        method: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(PaymentMethod::Cash),
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(PaymentStatus::Pending),
        description: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
