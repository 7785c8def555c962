use crate::api::MAX_SESSION_TTL_SECONDS;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("LEARNING_LOG_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("LEARNING_LOG_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum length of new passwords")
                .env("LEARNING_LOG_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub password_min_length: usize,
}

impl Options {
    /// Parse session and password arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_SESSION_TTL_SECONDS}"))?;
        let password_min_length = matches
            .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_PASSWORD_MIN_LENGTH}"))?;

        Ok(Self {
            session_ttl_seconds,
            session_cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            password_min_length,
        })
    }
}
