//! Rule-based chatbot: a single-dispatch keyword classifier over a static
//! knowledge table, with fixed priority order — emergency terms first, then
//! appointments, records, symptoms, health tips, payments, and greetings.
//!
//! Stateless across calls; the caller's live counts are fetched fresh per
//! message and attached to the reply.

pub mod knowledge;
pub mod types;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::RecordFilter;
pub use knowledge::{all_symptoms, is_emergency, symptom_by_name, SymptomEntry, HEALTH_TIPS};
pub use types::{BotReply, ChatContext, ReplyAction, ReplyPriority, ResponseKind};

/// Classify a message and produce the canned structured reply.
pub fn respond(message: &str, ctx: &ChatContext) -> BotReply {
    let text = message.trim();
    if text.is_empty() {
        return general_reply();
    }

    if knowledge::is_emergency(text) {
        let mut reply = BotReply::plain(
            ResponseKind::Emergency,
            ReplyPriority::Critical,
            "This sounds like a medical emergency. Call 911 or go to the nearest \
             emergency room immediately. Do not wait for an online response.",
        );
        reply.actions = vec![ReplyAction::Call911, ReplyAction::GoToEmergencyRoom];
        return reply;
    }

    if knowledge::APPOINTMENT_PATTERN.is_match(text) {
        let mut reply = BotReply::plain(
            ResponseKind::Appointment,
            ReplyPriority::Normal,
            match ctx.upcoming_appointments {
                0 => "You have no upcoming appointments. You can book one from the \
                      appointments page or ask reception for the next free slot."
                    .to_string(),
                1 => "You have 1 upcoming appointment. Would you like to book another \
                      or review it?"
                    .to_string(),
                n => format!(
                    "You have {n} upcoming appointments. Would you like to book another \
                     or review them?"
                ),
            },
        );
        reply.actions = vec![ReplyAction::BookAppointment, ReplyAction::ViewAppointments];
        reply.upcoming_appointments = Some(ctx.upcoming_appointments);
        return reply;
    }

    if knowledge::RECORDS_PATTERN.is_match(text) {
        let mut reply = BotReply::plain(
            ResponseKind::Records,
            ReplyPriority::Normal,
            format!(
                "You have {} active medical record(s) on file. You can view them from \
                 the records page; your care team can walk you through anything unclear.",
                ctx.active_records
            ),
        );
        reply.actions = vec![ReplyAction::ViewRecords];
        reply.active_records = Some(ctx.active_records);
        return reply;
    }

    if let Some(entry) = knowledge::match_symptom(text) {
        let mut reply = BotReply::plain(
            ResponseKind::Symptom,
            ReplyPriority::High,
            format!(
                "For {}: {} See a doctor if {}",
                entry.name, entry.advice, entry.see_doctor_if
            ),
        );
        reply.actions = vec![ReplyAction::BookAppointment];
        reply.suggestions = vec![format!("Book an appointment about your {}", entry.name)];
        return reply;
    }

    if knowledge::HEALTH_TIP_PATTERN.is_match(text) {
        // Rotate deterministically on message length; no per-user state to keep
        let tip = HEALTH_TIPS[text.len() % HEALTH_TIPS.len()];
        return BotReply::plain(ResponseKind::HealthTip, ReplyPriority::Normal, tip);
    }

    if knowledge::PAYMENT_PATTERN.is_match(text) {
        let mut reply = BotReply::plain(
            ResponseKind::Payment,
            ReplyPriority::Normal,
            "You can review bills and payment status on the payments page. Reception \
             can help with insurance and refund questions.",
        );
        reply.actions = vec![ReplyAction::ViewPayments, ReplyAction::ContactReception];
        return reply;
    }

    if knowledge::GREETING_PATTERN.is_match(text) {
        return BotReply::plain(
            ResponseKind::Greeting,
            ReplyPriority::Normal,
            format!(
                "Hello{}! I can help with appointments, medical records, symptoms, \
                 health tips, and billing. What do you need?",
                if ctx.first_name.is_empty() {
                    String::new()
                } else {
                    format!(" {}", ctx.first_name)
                }
            ),
        );
    }

    general_reply()
}

fn general_reply() -> BotReply {
    let mut reply = BotReply::plain(
        ResponseKind::General,
        ReplyPriority::Normal,
        "I didn't quite catch that. Try asking about appointments, your medical \
         records, a symptom, health tips, or billing.",
    );
    reply.suggestions = vec![
        "Show my upcoming appointments".into(),
        "I have a headache".into(),
        "Give me a health tip".into(),
    ];
    reply
}

/// Fetch the caller's live counts and respond. Nothing is retained between
/// calls.
pub fn respond_for_user(
    conn: &Connection,
    user_id: &Uuid,
    message: &str,
) -> Result<BotReply, DatabaseError> {
    let today = chrono::Utc::now().date_naive();
    let ctx = ChatContext {
        first_name: db::get_user(conn, user_id)?
            .map(|u| u.first_name)
            .unwrap_or_default(),
        upcoming_appointments: db::count_upcoming_for_patient(conn, user_id, today)?,
        active_records: db::list_records(
            conn,
            &RecordFilter {
                patient_id: Some(*user_id),
                record_type: None,
            },
        )?
        .len() as u32,
    };
    Ok(respond(message, &ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ChatContext {
        ChatContext {
            first_name: "Jane".into(),
            upcoming_appointments: 2,
            active_records: 3,
        }
    }

    #[test]
    fn chest_pain_preempts_everything() {
        // Mentions appointments and records too — emergency still wins
        let reply = respond(
            "I'm having chest pain, should I book an appointment or check my records?",
            &ctx(),
        );
        assert_eq!(reply.kind, ResponseKind::Emergency);
        assert_eq!(reply.priority, ReplyPriority::Critical);
        assert!(reply.actions.contains(&ReplyAction::Call911));
    }

    #[test]
    fn severe_headache_is_symptom_not_emergency() {
        let reply = respond("I have a severe headache", &ctx());
        assert_eq!(reply.kind, ResponseKind::Symptom);
        assert!(reply.message.contains("headache"));
        assert!(reply.message.contains("quiet, dark room"));
    }

    #[test]
    fn appointment_reply_carries_live_count() {
        let reply = respond("I want to book an appointment", &ctx());
        assert_eq!(reply.kind, ResponseKind::Appointment);
        assert_eq!(reply.upcoming_appointments, Some(2));
        assert!(reply.message.contains('2'));
    }

    #[test]
    fn appointment_outranks_symptom() {
        // Both categories match; appointment comes first in priority order
        let reply = respond("can I schedule a visit about my cough", &ctx());
        assert_eq!(reply.kind, ResponseKind::Appointment);
    }

    #[test]
    fn records_reply_carries_count() {
        let reply = respond("where can I see my lab results", &ctx());
        assert_eq!(reply.kind, ResponseKind::Records);
        assert_eq!(reply.active_records, Some(3));
    }

    #[test]
    fn health_tip_and_payment_and_greeting() {
        assert_eq!(
            respond("give me a health tip", &ctx()).kind,
            ResponseKind::HealthTip
        );
        assert_eq!(
            respond("how do I pay my bill", &ctx()).kind,
            ResponseKind::Payment
        );
        let greeting = respond("hello there", &ctx());
        assert_eq!(greeting.kind, ResponseKind::Greeting);
        assert!(greeting.message.contains("Jane"));
    }

    #[test]
    fn unmatched_text_falls_through_to_general() {
        let reply = respond("qwerty asdf zxcv", &ctx());
        assert_eq!(reply.kind, ResponseKind::General);
        assert!(!reply.suggestions.is_empty());
    }

    #[test]
    fn empty_message_is_general() {
        assert_eq!(respond("   ", &ctx()).kind, ResponseKind::General);
    }
}
