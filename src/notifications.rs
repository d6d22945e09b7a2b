//! Real-time notification channel: per-user rooms of connected WebSocket
//! senders, plus the one-time upgrade ticket store.
//!
//! The registry is explicit state owned by `AppState` and threaded through
//! the API; nothing registers itself as a module-load side effect. Pushes
//! are best-effort — a slow or closed connection drops the message rather
//! than blocking the request that produced it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

/// One-time WebSocket upgrade tickets live this long.
pub const WS_TICKET_TTL: Duration = Duration::from_secs(30);

/// Messages pushed to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Outgoing {
    Welcome {
        user_id: Uuid,
        session_id: String,
    },
    Heartbeat {
        server_time: String,
    },
    AppointmentUpdate {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        status: AppointmentStatus,
    },
}

impl Outgoing {
    pub fn appointment_update(appointment: &Appointment) -> Self {
        Outgoing::AppointmentUpdate {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            date: appointment.date,
            start_time: appointment.start_time,
            status: appointment.status,
        }
    }
}

/// Per-user rooms of connected WebSocket senders, keyed by connection id
/// so one user can hold several sockets.
#[derive(Clone, Default)]
pub struct Notifier {
    rooms: Arc<Mutex<HashMap<Uuid, HashMap<Uuid, mpsc::Sender<Outgoing>>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: Uuid, conn_id: Uuid, tx: mpsc::Sender<Outgoing>) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.entry(user_id).or_default().insert(conn_id, tx);
        }
    }

    pub fn unregister(&self, user_id: &Uuid, conn_id: &Uuid) {
        if let Ok(mut rooms) = self.rooms.lock() {
            if let Some(room) = rooms.get_mut(user_id) {
                room.remove(conn_id);
                if room.is_empty() {
                    rooms.remove(user_id);
                }
            }
        }
    }

    /// Deliver a message to every live connection in the user's room.
    /// Returns the number of connections that accepted it.
    pub fn push(&self, user_id: &Uuid, message: Outgoing) -> usize {
        let Ok(mut rooms) = self.rooms.lock() else {
            return 0;
        };
        let Some(room) = rooms.get_mut(user_id) else {
            return 0;
        };
        let mut delivered = 0;
        room.retain(|_, tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if room.is_empty() {
            rooms.remove(user_id);
        }
        delivered
    }

    /// Push an appointment event to both participants' rooms.
    pub fn notify_appointment(&self, appointment: &Appointment) {
        let message = Outgoing::appointment_update(appointment);
        self.push(&appointment.patient_id, message.clone());
        self.push(&appointment.doctor_id, message);
    }

    pub fn connection_count(&self, user_id: &Uuid) -> usize {
        self.rooms
            .lock()
            .map(|rooms| rooms.get(user_id).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

struct WsTicket {
    user_id: Uuid,
    expires_at: Instant,
}

/// Store for one-time WebSocket upgrade tickets. A ticket authorizes one
/// upgrade within [`WS_TICKET_TTL`]; the bearer token never appears in a
/// WebSocket URL.
#[derive(Default)]
pub struct WsTicketStore {
    tickets: HashMap<String, WsTicket>,
}

impl WsTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, user_id: Uuid) -> String {
        self.cleanup();
        let ticket = Uuid::new_v4().to_string();
        self.tickets.insert(
            ticket.clone(),
            WsTicket {
                user_id,
                expires_at: Instant::now() + WS_TICKET_TTL,
            },
        );
        ticket
    }

    /// Consume a ticket (one-time use). Returns the user it was issued to.
    pub fn consume(&mut self, ticket: &str) -> Option<Uuid> {
        let entry = self.tickets.remove(ticket)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        Some(entry.user_id)
    }

    fn cleanup(&mut self) {
        let now = Instant::now();
        self.tickets.retain(|_, t| now < t.expires_at);
    }
}
