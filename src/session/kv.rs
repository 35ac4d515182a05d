//! Key-value backend used by the session store.
//!
//! Multi-key writes are queued on a [`Transaction`] and applied with
//! [`KvBackend::commit`], which must apply every queued command or none of them.
//! A transaction that is dropped without being committed is discarded.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("key-value backend unavailable: {0}")]
    Unavailable(String),
    #[error("key-value backend did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Del {
        key: String,
    },
}

/// Commands queued for atomic application.
#[derive(Debug, Default)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    #[must_use]
    pub fn begin() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Duration,
    ) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Del { key: key.into() });
        self
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command without applying it.
    pub fn discard(self) {
        debug!(commands = self.commands.len(), "transaction discarded");
    }
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    async fn del(&self, key: &str) -> Result<(), BackendError>;

    /// Apply every command of `tx` atomically; other clients never observe a subset.
    async fn commit(&self, tx: Transaction) -> Result<(), BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process backend with per-key TTL.
///
/// Expired keys are dropped lazily when touched. Uses the tokio clock so paused-time tests
/// can advance past TTLs.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(entries: &mut HashMap<String, Entry>, command: Command, now: Instant) {
        match command {
            Command::Set { key, value, ttl } => {
                entries.insert(
                    key,
                    Entry {
                        value,
                        expires_at: now + ttl,
                    },
                );
            }
            Command::Del { key } => {
                entries.remove(&key);
            }
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        Self::apply(
            &mut entries,
            Command::Set {
                key: key.to_string(),
                value: value.to_string(),
                ttl,
            },
            Instant::now(),
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), BackendError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn commit(&self, tx: Transaction) -> Result<(), BackendError> {
        // One write-lock section: readers see all of the transaction or none of it.
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        for command in tx.into_commands() {
            Self::apply(&mut entries, command, now);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
