//! Outbound email seam. Transport is deployment-specific; the default
//! implementation records dispatches in the log so flows that depend on
//! email (verification, password reset) stay testable offline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail dispatch failed: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Logs the dispatch instead of sending. Token links stay out of the log
/// line itself.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email dispatched");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Captures dispatched mail for assertions.
    #[derive(Default)]
    pub struct CapturingMailer {
        pub sent: Mutex<Vec<OutboundEmail>>,
    }

    impl Mailer for CapturingMailer {
        fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mailer_accepts_dispatch() {
        let mailer = LogMailer;
        let result = mailer.send(&OutboundEmail {
            to: "someone@example.com".into(),
            subject: "Welcome".into(),
            body: "Hello".into(),
        });
        assert!(result.is_ok());
    }
}
