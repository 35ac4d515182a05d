use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SECRET: &str = "secret";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_STORE_TIMEOUT_MS: &str = "store-timeout-ms";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: SecretString,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub store_timeout_ms: u64,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is empty, a TTL is zero, or the access TTL outlives
    /// the refresh TTL.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = match matches.get_one::<String>(ARG_SECRET) {
            Some(secret) if !secret.trim().is_empty() => SecretString::from(secret.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_SECRET}"),
        };

        let get_u64 =
            |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        let access_ttl_seconds = get_u64(ARG_ACCESS_TTL_SECONDS, 900);
        let refresh_ttl_seconds = get_u64(ARG_REFRESH_TTL_SECONDS, 604_800);
        let store_timeout_ms = get_u64(ARG_STORE_TIMEOUT_MS, 3000);

        for (name, value) in [
            (ARG_ACCESS_TTL_SECONDS, access_ttl_seconds),
            (ARG_REFRESH_TTL_SECONDS, refresh_ttl_seconds),
            (ARG_STORE_TIMEOUT_MS, store_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("--{name} must be greater than zero");
            }
        }

        if access_ttl_seconds > refresh_ttl_seconds {
            anyhow::bail!(
                "--{ARG_ACCESS_TTL_SECONDS} ({access_ttl_seconds}) must not exceed --{ARG_REFRESH_TTL_SECONDS} ({refresh_ttl_seconds})"
            );
        }

        Ok(Self {
            secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
            store_timeout_ms,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET)
                .long(ARG_SECRET)
                .help("Shared secret used to sign session tokens")
                .long_help(
                    "Shared secret used to sign session tokens. Rotating it invalidates every outstanding token.",
                )
                .env("TOLLGATE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("TOLLGATE_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh entry TTL in seconds, also the session cookie Max-Age")
                .env("TOLLGATE_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_MS)
                .long(ARG_STORE_TIMEOUT_MS)
                .help("Deadline for each session store call in milliseconds")
                .env("TOLLGATE_STORE_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("TOLLGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
