use super::{MailError, MailSender};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error};

pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    from: String,
}

impl SmtpConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from: from.into(),
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: String, password: SecretString) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }
}

/// Sends through an implicit-TLS SMTP relay.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailSender {
    /// # Errors
    /// Returns an error if the relay host or the sender address is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|err| MailError::Address(format!("{}: {err}", config.from)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| MailError::Transport(err.to_string()))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

pub(super) fn build_message(
    from: &Mailbox,
    subject: &str,
    to: &str,
    body: &str,
) -> Result<Message, MailError> {
    let to = to
        .parse::<Mailbox>()
        .map_err(|err| MailError::Address(format!("{to}: {err}")))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(body.to_string())
        .map_err(|err| MailError::Message(err.to_string()))
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, subject: &str, to: &str, body: &str) -> Result<(), MailError> {
        let message = build_message(&self.from, subject, to, body)?;

        match self.transport.send(message).await {
            Ok(_) => {
                debug!(to_email = %to, "mail sent");
                Ok(())
            }
            Err(err) => {
                error!(to_email = %to, "Failed to send mail: {err}");
                Err(MailError::Transport(err.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for SmtpMailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailSender")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_implicit_tls_port() {
        let config = SmtpConfig::new("smtp.example.com", "no-reply@example.com");
        assert_eq!(config.port(), DEFAULT_SMTP_PORT);
        assert_eq!(config.host(), "smtp.example.com");
        assert_eq!(config.with_port(2525).port(), 2525);
    }

    #[test]
    fn invalid_sender_address_is_rejected() {
        let config = SmtpConfig::new("smtp.example.com", "not an address");
        assert!(matches!(
            SmtpMailSender::new(&config),
            Err(MailError::Address(_))
        ));
    }

    #[test]
    fn message_requires_valid_recipient() {
        let from: Mailbox = "no-reply@example.com".parse().unwrap();
        assert!(matches!(
            build_message(&from, "subject", "nope", "<p>body</p>"),
            Err(MailError::Address(_))
        ));

        let message = build_message(&from, "subject", "a@x.com", "<p>body</p>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: subject"));
        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn sender_builds_with_credentials() {
        let config = SmtpConfig::new("smtp.example.com", "Tollgate <no-reply@example.com>")
            .with_credentials("user".to_string(), SecretString::from("pass".to_string()));
        let sender = SmtpMailSender::new(&config).unwrap();
        assert!(format!("{sender:?}").contains("no-reply@example.com"));
        assert!(!format!("{sender:?}").contains("pass"));
    }
}
