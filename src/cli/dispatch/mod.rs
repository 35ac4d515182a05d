//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, rejecting configurations the server
//! could not run with before anything connects.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    mail, redis, session, verification, ARG_DSN, ARG_PORT, ARG_REQUEST_TIMEOUT_SECONDS,
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let request_timeout_seconds = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(10);
    if request_timeout_seconds == 0 {
        anyhow::bail!("--{ARG_REQUEST_TIMEOUT_SECONDS} must be greater than zero");
    }

    let session_opts = session::Options::parse(matches)?;
    let redis_opts = redis::Options::parse(matches)?;
    let verification_opts = verification::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        redis_url: redis_opts.url,
        secret: session_opts.secret,
        access_ttl: Duration::from_secs(session_opts.access_ttl_seconds),
        refresh_ttl: Duration::from_secs(session_opts.refresh_ttl_seconds),
        store_timeout: Duration::from_millis(session_opts.store_timeout_ms),
        request_timeout: Duration::from_secs(request_timeout_seconds),
        cookie_secure: session_opts.cookie_secure,
        code_ttl: Duration::from_secs(verification_opts.code_ttl_seconds),
        code_max_attempts: verification_opts.code_max_attempts,
        smtp: mail_opts.smtp,
        notify_timeout: Duration::from_secs(mail_opts.notify_timeout_seconds),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{
        self,
        tests::{required_args, with_clean_env},
    };
    use secrecy::ExposeSecret;

    fn dispatch(extra: &[&str]) -> Result<Action> {
        let mut args = required_args();
        args.extend(extra.iter().map(ToString::to_string));
        let matches = commands::new().get_matches_from(args);
        handler(&matches)
    }

    fn error_of(extra: &[&str]) -> String {
        let mut message = String::new();
        with_clean_env(|| {
            if let Err(err) = dispatch(extra) {
                message = err.to_string();
            }
        });
        message
    }

    #[test]
    fn defaults_build_server_args() {
        with_clean_env(|| {
            let action = dispatch(&[]);
            assert!(action.is_ok());
            if let Ok(Action::Server(args)) = action {
                assert_eq!(args.port, 8080);
                assert_eq!(args.secret.expose_secret(), "s3cr3t");
                assert_eq!(args.access_ttl, Duration::from_secs(900));
                assert_eq!(args.refresh_ttl, Duration::from_secs(604_800));
                assert_eq!(args.store_timeout, Duration::from_millis(3000));
                assert_eq!(args.request_timeout, Duration::from_secs(10));
                assert_eq!(args.code_ttl, Duration::from_secs(600));
                assert_eq!(args.code_max_attempts, 3);
                assert!(args.smtp.is_none());
                assert!(!args.cookie_secure);
            }
        });
    }

    #[test]
    fn smtp_relay_is_configured() {
        with_clean_env(|| {
            let action = dispatch(&[
                "--smtp-host",
                "smtp.tollgate.dev",
                "--mail-from",
                "noreply@tollgate.dev",
                "--smtp-port",
                "2465",
            ]);
            assert!(action.is_ok());
            if let Ok(Action::Server(args)) = action {
                let smtp = args.smtp;
                assert!(smtp.is_some());
                if let Some(smtp) = smtp {
                    assert_eq!(smtp.host(), "smtp.tollgate.dev");
                    assert_eq!(smtp.port(), 2465);
                    assert_eq!(smtp.from(), "noreply@tollgate.dev");
                }
            }
        });
    }

    #[test]
    fn rejects_access_ttl_above_refresh_ttl() {
        let message = error_of(&["--access-ttl-seconds", "120", "--refresh-ttl-seconds", "60"]);
        assert!(message.contains("must not exceed"), "{message}");
    }

    #[test]
    fn rejects_zero_ttls() {
        let message = error_of(&["--access-ttl-seconds", "0"]);
        assert!(message.contains("--access-ttl-seconds"), "{message}");

        let message = error_of(&["--code-ttl-seconds", "0"]);
        assert!(message.contains("--code-ttl-seconds"), "{message}");
    }

    #[test]
    fn rejects_zero_attempts() {
        let message = error_of(&["--code-max-attempts", "0"]);
        assert!(message.contains("at least 1"), "{message}");
    }

    #[test]
    fn rejects_blank_secret() {
        with_clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "tollgate",
                "--dsn",
                commands::tests::DSN,
                "--redis-url",
                commands::tests::REDIS_URL,
                "--secret",
                "  ",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--secret"));
            }
        });
    }

    #[test]
    fn smtp_host_requires_sender() {
        let message = error_of(&["--smtp-host", "smtp.tollgate.dev"]);
        assert!(message.contains("--mail-from"), "{message}");
    }

    #[test]
    fn smtp_credentials_come_in_pairs() {
        let message = error_of(&[
            "--smtp-host",
            "smtp.tollgate.dev",
            "--mail-from",
            "noreply@tollgate.dev",
            "--smtp-username",
            "mailer",
        ]);
        assert!(message.contains("together"), "{message}");
    }
}
