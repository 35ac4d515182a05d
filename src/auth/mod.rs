//! Login, session checks and logout.
//!
//! Errors leaving this module are narrowed to what a client may learn. Unknown users and
//! wrong passwords look the same, and store or database faults are logged here and
//! reported as `Internal`.

use crate::{
    directory::{normalize_email, CredentialHasher, DirectoryError, UserDirectory},
    session::{Claims, SessionError, SessionStore, TokenTtl},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error")]
    Internal,
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::TokenNotValid
            | SessionError::TokenNotExist
            | SessionError::TokenExpired => Self::Unauthorized,
            SessionError::StoreUnavailable(_) | SessionError::Codec(_) => {
                error!("Session store failure: {err}");
                Self::Internal
            }
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        error!("User directory failure: {err}");
        Self::Internal
    }
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Result of [`AuthService::check_session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCheck {
    Active(Claims),
    /// The access token had expired and was replaced; the client must switch to `token`.
    Renewed { claims: Claims, token: String },
}

impl SessionCheck {
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        match self {
            Self::Active(claims) | Self::Renewed { claims, .. } => claims,
        }
    }

    #[must_use]
    pub fn renewed_token(&self) -> Option<&str> {
        match self {
            Self::Active(_) => None,
            Self::Renewed { token, .. } => Some(token),
        }
    }
}

pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    sessions: Arc<SessionStore>,
    ttl: TokenTtl,
    // Verified against for unknown emails so both paths pay for Argon2.
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
        sessions: Arc<SessionStore>,
        ttl: TokenTtl,
    ) -> Self {
        Self {
            directory,
            hasher,
            sessions,
            ttl,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Verify the password and open a session, returning the access token.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password, `Internal` otherwise.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: Credentials) -> Result<String, AuthError> {
        let email = normalize_email(&credentials.email);

        let Some(user) = self.directory.find_by_email(&email).await? else {
            self.burn_verification(credentials.password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(credentials.password, user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.sessions.issue(&user.principal(), self.ttl).await?;
        info!(user_id = user.id, "login succeeded");
        Ok(token)
    }

    async fn burn_verification(&self, password: String) -> Result<(), AuthError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hasher.hash_blocking("tollgate-dummy".to_string()))
            .await?;
        self.hasher.verify_blocking(password, dummy.clone()).await?;
        Ok(())
    }

    /// Validate the token, renewing it once if only its access expiry has passed.
    ///
    /// # Errors
    /// `Unauthorized` when the session is dead or the token is not ours, `Internal` on
    /// store failures or when a freshly renewed token does not validate.
    #[instrument(skip_all)]
    pub async fn check_session(&self, token: &str) -> Result<SessionCheck, AuthError> {
        match self.sessions.validate(token).await {
            Ok(claims) => Ok(SessionCheck::Active(claims)),
            Err(SessionError::TokenExpired) => {
                let renewed = self.sessions.renew(token, self.ttl.access).await?;
                let claims = self.sessions.validate(&renewed).await.map_err(|err| {
                    error!("Renewed token failed validation: {err}");
                    AuthError::Internal
                })?;
                Ok(SessionCheck::Renewed {
                    claims,
                    token: renewed,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// `Unauthorized` for a token that is not ours, `Internal` on store failures.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.revoke(token).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("sessions", &self.sessions)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
