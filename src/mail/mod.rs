//! Outgoing mail.
//!
//! The service sends two messages: the verification code and the registration notice.
//! With an SMTP relay configured mail goes out through [`SmtpMailSender`], otherwise
//! [`LogMailSender`] writes it to the log.

pub mod smtp;
pub mod templates;

pub use self::smtp::{SmtpConfig, SmtpMailSender};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver an HTML message to `to`.
    async fn send(&self, subject: &str, to: &str, body: &str) -> Result<(), MailError>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, subject: &str, to: &str, body: &str) -> Result<(), MailError> {
        info!(to_email = %to, subject = %subject, bytes = body.len(), "mail send stub");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{MailError, MailSender};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct SentMail {
        pub subject: String,
        pub to: String,
        pub body: String,
    }

    /// Keeps every message, optionally failing all sends.
    #[derive(Debug, Default)]
    pub struct RecordingMailSender {
        sent: Mutex<Vec<SentMail>>,
        fail: bool,
    }

    impl RecordingMailSender {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl MailSender for RecordingMailSender {
        async fn send(&self, subject: &str, to: &str, body: &str) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("relay refused connection".to_string()));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(SentMail {
                    subject: subject.to_string(),
                    to: to.to_string(),
                    body: body.to_string(),
                });
            }
            Ok(())
        }
    }
}
