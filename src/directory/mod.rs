//! User accounts: lookup, creation and password hashing.

pub mod password;
pub mod postgres;

pub use self::password::CredentialHasher;
pub use self::postgres::PgUserDirectory;

use crate::session::{Principal, Role};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Canonical form of an email address for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Emails are stored and looked up already normalized.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DirectoryError>;

    /// Returns the new user's id, `AlreadyExists` if the email is taken.
    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, DirectoryError>;

    async fn ping(&self) -> Result<(), DirectoryError>;
}

#[derive(Debug, Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, UserRecord>,
}

/// In-process directory, ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Users>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users.by_id.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }

    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, DirectoryError> {
        let mut users = self.users.write().await;
        if users.by_id.values().any(|user| user.email == email) {
            return Err(DirectoryError::AlreadyExists);
        }

        users.next_id += 1;
        let id = users.next_id;
        users.by_id.insert(
            id,
            UserRecord {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                role,
            },
        );
        Ok(id)
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}
