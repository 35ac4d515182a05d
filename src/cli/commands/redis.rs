use clap::{Arg, ArgMatches, Command};

pub const ARG_REDIS_URL: &str = "redis-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the URL is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        match matches.get_one::<String>(ARG_REDIS_URL) {
            Some(url) if !url.trim().is_empty() => Ok(Self { url: url.clone() }),
            _ => anyhow::bail!("missing required argument: --{ARG_REDIS_URL}"),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_REDIS_URL)
            .long(ARG_REDIS_URL)
            .help("Session store URL, example: redis://127.0.0.1:6379/0")
            .env("TOLLGATE_REDIS_URL")
            .required(true),
    )
}
