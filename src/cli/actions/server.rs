use crate::{
    api::{self, handlers::CookieConfig},
    auth::AuthService,
    directory::{CredentialHasher, PgUserDirectory, UserDirectory},
    mail::{LogMailSender, MailSender, SmtpConfig, SmtpMailSender},
    registration::RegistrationGate,
    session::{CredentialCodec, RedisBackend, SessionStore, TokenTtl},
    verification::CodeStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub redis_url: String,
    pub secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
    pub cookie_secure: bool,
    pub code_ttl: Duration,
    pub code_max_attempts: u32,
    pub smtp: Option<SmtpConfig>,
    pub notify_timeout: Duration,
}

fn mail_sender(smtp: Option<&SmtpConfig>) -> Result<Arc<dyn MailSender>> {
    match smtp {
        Some(config) => {
            info!(host = config.host(), port = config.port(), "sending mail through SMTP relay");
            let sender = SmtpMailSender::new(config).context("Invalid SMTP configuration")?;
            Ok(Arc::new(sender))
        }
        None => {
            info!("no SMTP relay configured, mail will only be logged");
            Ok(Arc::new(LogMailSender))
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or session store cannot be reached, or the server fails
/// to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;
    let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool));

    let backend = RedisBackend::connect(&args.redis_url)
        .await
        .context("Failed to connect to session store")?;
    let sessions = Arc::new(
        SessionStore::new(Arc::new(backend), CredentialCodec::new(&args.secret))
            .with_deadline(args.store_timeout),
    );

    let ttl = TokenTtl {
        access: args.access_ttl,
        refresh: args.refresh_ttl,
    };
    let hasher = CredentialHasher::default();

    let codes = Arc::new(
        CodeStore::new()
            .with_validity(args.code_ttl)
            .with_max_attempts(args.code_max_attempts),
    );
    let mail = mail_sender(args.smtp.as_ref())?;

    let services = api::Services {
        auth: Arc::new(AuthService::new(
            directory.clone(),
            hasher.clone(),
            sessions.clone(),
            ttl,
        )),
        registration: Arc::new(
            RegistrationGate::new(codes, mail, directory.clone(), hasher)
                .with_notify_timeout(args.notify_timeout),
        ),
        directory,
        sessions,
        cookies: CookieConfig::new(args.refresh_ttl).with_secure(args.cookie_secure),
    };

    api::new(args.port, services, args.request_timeout).await
}
