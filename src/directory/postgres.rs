use super::{DirectoryError, UserDirectory, UserRecord};
use crate::session::Role;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};

/// Users kept in the `users` table (see `sql/schema.sql`).
#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, DirectoryError> {
    let role: i16 = row.try_get("role")?;
    let role = Role::from_i16(role).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "role".to_string(),
        source: format!("unknown role {role}").into(),
    })?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
    })
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let query = "SELECT id, email, password_hash, role FROM users WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DirectoryError> {
        let query = "SELECT id, email, password_hash, role FROM users WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, DirectoryError> {
        let query = "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING id";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .bind(role.as_i16())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    DirectoryError::AlreadyExists
                } else {
                    DirectoryError::Database(err)
                }
            })?;

        Ok(row.try_get("id")?)
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
