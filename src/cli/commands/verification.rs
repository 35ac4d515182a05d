use clap::{Arg, ArgMatches, Command};

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_CODE_MAX_ATTEMPTS: &str = "code-max-attempts";

#[derive(Debug, Clone)]
pub struct Options {
    pub code_ttl_seconds: u64,
    pub code_max_attempts: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if the window is zero or no attempt is allowed.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let code_ttl_seconds = matches
            .get_one::<u64>(ARG_CODE_TTL_SECONDS)
            .copied()
            .unwrap_or(600);
        let code_max_attempts = matches
            .get_one::<u32>(ARG_CODE_MAX_ATTEMPTS)
            .copied()
            .unwrap_or(3);

        if code_ttl_seconds == 0 {
            anyhow::bail!("--{ARG_CODE_TTL_SECONDS} must be greater than zero");
        }
        if code_max_attempts == 0 {
            anyhow::bail!("--{ARG_CODE_MAX_ATTEMPTS} must be at least 1");
        }

        Ok(Self {
            code_ttl_seconds,
            code_max_attempts,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("How long an emailed verification code stays valid, in seconds")
                .env("TOLLGATE_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_CODE_MAX_ATTEMPTS)
                .long(ARG_CODE_MAX_ATTEMPTS)
                .help("Wrong guesses allowed before a verification code is burned")
                .env("TOLLGATE_CODE_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
}
