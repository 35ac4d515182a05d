//! Account creation gated by an emailed verification code.

use crate::{
    directory::{normalize_email, CredentialHasher, DirectoryError, UserDirectory},
    mail::{templates, MailSender},
    session::Role,
    verification::CodeStore,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn, Instrument};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("verification code is invalid")]
    InvalidCode,
    #[error("verification mail could not be sent")]
    MailDispatchFailed,
    #[error("internal error")]
    Internal,
}

impl From<DirectoryError> for RegistrationError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::AlreadyExists => Self::UserAlreadyExists,
            DirectoryError::Database(_) | DirectoryError::Hash(_) => {
                error!("User directory failure: {err}");
                Self::Internal
            }
        }
    }
}

pub struct NewUser {
    pub email: String,
    pub password: String,
    pub code: u32,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"***")
            .finish_non_exhaustive()
    }
}

pub struct RegistrationGate {
    codes: Arc<CodeStore>,
    mail: Arc<dyn MailSender>,
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    notify_timeout: Duration,
}

impl RegistrationGate {
    #[must_use]
    pub fn new(
        codes: Arc<CodeStore>,
        mail: Arc<dyn MailSender>,
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
    ) -> Self {
        Self {
            codes,
            mail,
            directory,
            hasher,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Upper bound for the registration notice sent after a successful `register`.
    #[must_use]
    pub const fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Issue a code for `email` and mail it, waiting for the relay to accept it.
    ///
    /// # Errors
    /// `UserAlreadyExists` if the email is registered, `MailDispatchFailed` if the mail was
    /// not accepted, `Internal` on directory failures.
    #[instrument(skip(self))]
    pub async fn send_code(&self, email: &str) -> Result<(), RegistrationError> {
        let email = normalize_email(email);

        if self.directory.find_by_email(&email).await?.is_some() {
            return Err(RegistrationError::UserAlreadyExists);
        }

        let code = self.codes.issue_code(&email).await;
        let body = templates::verification_code(code, self.codes.validity());

        self.mail
            .send(templates::VERIFICATION_SUBJECT, &email, &body)
            .await
            .map_err(|err| {
                error!("Failed to send verification code: {err}");
                RegistrationError::MailDispatchFailed
            })?;

        debug!("verification code sent");
        Ok(())
    }

    /// Consume the code and create the user, returning its id.
    ///
    /// The registration notice is sent in the background; its failure is only logged.
    ///
    /// # Errors
    /// `InvalidCode` if the code does not match, `UserAlreadyExists` if the email was taken
    /// meanwhile, `Internal` on hashing or directory failures.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn register(&self, user: NewUser) -> Result<i64, RegistrationError> {
        let email = normalize_email(&user.email);

        if !self.codes.check_code(&email, user.code).await {
            return Err(RegistrationError::InvalidCode);
        }

        let password_hash = self.hasher.hash_blocking(user.password).await?;
        let id = self
            .directory
            .insert(&email, &password_hash, Role::User)
            .await?;
        info!(user_id = id, "user registered");

        self.spawn_notice(email);
        Ok(id)
    }

    /// Whether a code is outstanding for `email`, stale codes included.
    pub async fn has_pending_code(&self, email: &str) -> bool {
        self.codes.exists(&normalize_email(email)).await
    }

    fn spawn_notice(&self, email: String) {
        let mail = Arc::clone(&self.mail);
        let timeout = self.notify_timeout;

        tokio::spawn(
            async move {
                let body = templates::registration_notice(&email);
                let send = mail.send(templates::REGISTRATION_SUBJECT, &email, &body);
                match tokio::time::timeout(timeout, send).await {
                    Ok(Ok(())) => debug!("registration notice sent"),
                    Ok(Err(err)) => warn!("Failed to send registration notice: {err}"),
                    Err(_) => warn!("Registration notice timed out after {timeout:?}"),
                }
            }
            .in_current_span(),
        );
    }
}

impl std::fmt::Debug for RegistrationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationGate")
            .field("codes", &self.codes)
            .field("notify_timeout", &self.notify_timeout)
            .finish_non_exhaustive()
    }
}
