//! Paired access/refresh sessions kept in a key-value store.
//!
//! Each subject owns two entries, `access:<id>` and `refresh:<id>`, both written with the
//! refresh TTL. The access token's short life comes from its signed expiry, the store only
//! decides whether a session is still alive.

pub mod codec;
pub mod kv;
pub mod redis;

pub use self::codec::{
    Claims, CodecError, CredentialCodec, Parsed, Principal, Role, TokenStatus,
};
pub use self::kv::{BackendError, KvBackend, MemoryBackend, Transaction};
pub use self::redis::RedisBackend;

use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token is not valid")]
    TokenNotValid,
    #[error("token has expired")]
    TokenExpired,
    #[error("session does not exist")]
    TokenNotExist,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] BackendError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

#[must_use]
pub fn access_key(subject_id: i64) -> String {
    format!("access:{subject_id}")
}

#[must_use]
pub fn refresh_key(subject_id: i64) -> String {
    format!("refresh:{subject_id}")
}

pub struct SessionStore {
    backend: Arc<dyn KvBackend>,
    codec: CredentialCodec,
    deadline: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>, codec: CredentialCodec) -> Self {
        Self {
            backend,
            codec,
            deadline: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Upper bound for every single backend call.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.deadline, call)
            .await
            .map_err(|_| BackendError::Timeout(self.deadline))?
    }

    /// # Errors
    /// Returns an error if the backend does not answer within the deadline.
    pub async fn ping(&self) -> Result<(), SessionError> {
        Ok(self.bounded(self.backend.ping()).await?)
    }

    /// Start a session for `principal` and return its access token.
    ///
    /// # Errors
    /// `Codec` if minting fails, `StoreUnavailable` if the commit fails.
    #[instrument(skip(self, principal), fields(subject_id = principal.id))]
    pub async fn issue(
        &self,
        principal: &Principal,
        ttl: TokenTtl,
    ) -> Result<String, SessionError> {
        let access = self.codec.mint(principal, ttl.access)?;
        let refresh = self.codec.mint(principal, ttl.refresh)?;

        let mut tx = Transaction::begin();
        tx.set(access_key(principal.id), access.clone(), ttl.refresh)
            .set(refresh_key(principal.id), refresh, ttl.refresh);
        self.bounded(self.backend.commit(tx)).await?;

        debug!("session issued");
        Ok(access)
    }

    /// Check an access token against the live session and return the refresh claims.
    ///
    /// # Errors
    /// `TokenNotValid` for a bad signature or a token that is no longer the current one,
    /// `TokenExpired` once the access token's own expiry has passed, `TokenNotExist` when the
    /// session is gone.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = match self.codec.parse(token) {
            Parsed::Valid(claims) => claims,
            Parsed::Expired(_) => return Err(SessionError::TokenExpired),
            Parsed::Malformed => return Err(SessionError::TokenNotValid),
        };

        let stored = self
            .bounded(self.backend.get(&access_key(claims.subject_id)))
            .await?;
        match stored {
            None => return Err(SessionError::TokenNotExist),
            Some(stored) if stored != token => return Err(SessionError::TokenNotValid),
            Some(_) => {}
        }

        self.load_refresh(claims.subject_id).await
    }

    /// Mint a fresh access token from the live refresh entry.
    ///
    /// The presented token may be expired; only its signature must hold. Renewal is not
    /// single-use, a replayed token renews again while the refresh entry lives.
    ///
    /// # Errors
    /// `TokenNotValid` for a bad signature, `TokenNotExist` when the session is gone.
    #[instrument(skip(self, token))]
    pub async fn renew(&self, token: &str, access_ttl: Duration) -> Result<String, SessionError> {
        let Some(claims) = self.codec.parse(token).signed_claims() else {
            return Err(SessionError::TokenNotValid);
        };
        let key = access_key(claims.subject_id);

        if self.bounded(self.backend.get(&key)).await?.is_none() {
            return Err(SessionError::TokenNotExist);
        }
        let refresh = self.load_refresh(claims.subject_id).await?;

        let renewed = self.codec.mint(&refresh.principal(), access_ttl)?;
        let keep = refresh.remaining().max(Duration::from_secs(1));

        let mut tx = Transaction::begin();
        tx.del(key.clone()).set(key, renewed.clone(), keep);
        self.bounded(self.backend.commit(tx)).await?;

        debug!(subject_id = claims.subject_id, "session renewed");
        Ok(renewed)
    }

    /// End the session the token belongs to.
    ///
    /// # Errors
    /// `TokenNotValid` for a bad signature, nothing is deleted in that case.
    #[instrument(skip_all)]
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let Some(claims) = self.codec.parse(token).signed_claims() else {
            return Err(SessionError::TokenNotValid);
        };

        let mut tx = Transaction::begin();
        tx.del(access_key(claims.subject_id))
            .del(refresh_key(claims.subject_id));
        self.bounded(self.backend.commit(tx)).await?;

        debug!(subject_id = claims.subject_id, "session revoked");
        Ok(())
    }

    async fn load_refresh(&self, subject_id: i64) -> Result<Claims, SessionError> {
        let stored = self
            .bounded(self.backend.get(&refresh_key(subject_id)))
            .await?
            .ok_or(SessionError::TokenNotExist)?;

        match self.codec.parse(&stored) {
            Parsed::Valid(claims) => Ok(claims),
            Parsed::Expired(_) | Parsed::Malformed => Err(SessionError::TokenNotExist),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("codec", &self.codec)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
