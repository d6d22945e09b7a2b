use serde::Serialize;

/// Classified reply category, in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Emergency,
    Appointment,
    Records,
    Symptom,
    HealthTip,
    Payment,
    Greeting,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPriority {
    Critical,
    High,
    Normal,
}

/// A suggested follow-up the client can render as a quick action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyAction {
    Call911,
    GoToEmergencyRoom,
    BookAppointment,
    ViewAppointments,
    ViewRecords,
    ViewPayments,
    ContactReception,
}

/// The dispatcher's structured reply.
#[derive(Debug, Clone, Serialize)]
pub struct BotReply {
    pub kind: ResponseKind,
    pub priority: ReplyPriority,
    pub message: String,
    pub actions: Vec<ReplyAction>,
    pub suggestions: Vec<String>,
    /// Live count attached to appointment replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_appointments: Option<u32>,
    /// Live count attached to records replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_records: Option<u32>,
}

impl BotReply {
    pub fn plain(kind: ResponseKind, priority: ReplyPriority, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            message: message.into(),
            actions: Vec::new(),
            suggestions: Vec::new(),
            upcoming_appointments: None,
            active_records: None,
        }
    }
}

/// Per-caller facts fetched fresh for each message.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub first_name: String,
    pub upcoming_appointments: u32,
    pub active_records: u32,
}
