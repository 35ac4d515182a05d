use crate::mail::{smtp::DEFAULT_SMTP_PORT, SmtpConfig};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_NOTIFY_TIMEOUT_SECONDS: &str = "mail-notify-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    /// `None` means mail is only logged.
    pub smtp: Option<SmtpConfig>,
    pub notify_timeout_seconds: u64,
}

impl Options {
    /// Parse mail arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a relay is configured without a sender address, or with only half
    /// of the credentials.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // clap passes "" through when the env var is set but empty
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let notify_timeout_seconds = matches
            .get_one::<u64>(ARG_MAIL_NOTIFY_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10);

        let Some(host) = get_non_empty(ARG_SMTP_HOST) else {
            return Ok(Self {
                smtp: None,
                notify_timeout_seconds,
            });
        };

        let Some(from) = get_non_empty(ARG_MAIL_FROM) else {
            anyhow::bail!(
                "missing required argument: --{ARG_MAIL_FROM} (required with --{ARG_SMTP_HOST})"
            );
        };

        let port = matches
            .get_one::<u16>(ARG_SMTP_PORT)
            .copied()
            .unwrap_or(DEFAULT_SMTP_PORT);

        let mut config = SmtpConfig::new(host, from).with_port(port);

        match (
            get_non_empty(ARG_SMTP_USERNAME),
            get_non_empty(ARG_SMTP_PASSWORD),
        ) {
            (Some(username), Some(password)) => {
                config = config.with_credentials(username, SecretString::from(password));
            }
            (None, None) => {}
            _ => anyhow::bail!(
                "--{ARG_SMTP_USERNAME} and --{ARG_SMTP_PASSWORD} must be given together"
            ),
        }

        Ok(Self {
            smtp: Some(config),
            notify_timeout_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host; mail is only logged when unset")
                .env("TOLLGATE_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port (implicit TLS)")
                .env("TOLLGATE_SMTP_PORT")
                .default_value("465")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("TOLLGATE_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("TOLLGATE_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address, example: Tollgate <noreply@tollgate.dev>")
                .env("TOLLGATE_MAIL_FROM"),
        )
        .arg(
            Arg::new(ARG_MAIL_NOTIFY_TIMEOUT_SECONDS)
                .long(ARG_MAIL_NOTIFY_TIMEOUT_SECONDS)
                .help("Upper bound for the background registration notice, in seconds")
                .env("TOLLGATE_MAIL_NOTIFY_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}
