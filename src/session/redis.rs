use super::kv::{BackendError, Command, KvBackend, Transaction};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisError};
use std::time::Duration;
use tracing::{info_span, Instrument};

impl From<RedisError> for BackendError {
    fn from(error: RedisError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Redis implementation of [`KvBackend`].
///
/// `ConnectionManager` reconnects on its own and is cheap to clone, so every call works on
/// its own handle.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Open a managed connection to `url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

// PX rejects zero, keys must live at least one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection.clone();
        let span = info_span!("kv.command", db.system = "redis", db.operation = "GET");
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .instrument(span)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let span = info_span!("kv.command", db.system = "redis", db.operation = "SET");
        let (): () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let span = info_span!("kv.command", db.system = "redis", db.operation = "DEL");
        let (): () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn commit(&self, tx: Transaction) -> Result<(), BackendError> {
        if tx.is_empty() {
            return Ok(());
        }

        let commands = tx.into_commands();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in &commands {
            match command {
                Command::Set { key, value, ttl } => {
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("PX")
                        .arg(ttl_millis(*ttl))
                        .ignore();
                }
                Command::Del { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
            }
        }

        let mut conn = self.connection.clone();
        let span = info_span!(
            "kv.command",
            db.system = "redis",
            db.operation = "MULTI",
            db.commands = commands.len()
        );
        let (): () = pipe.query_async(&mut conn).instrument(span).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let span = info_span!("kv.ping", db.system = "redis", db.operation = "PING");
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .instrument(span)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }
}
