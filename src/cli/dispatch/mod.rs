//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, accounts};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty())
        .context("missing required argument: --dsn")?;

    let accounts_opts = accounts::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_ttl_seconds: accounts_opts.session_ttl_seconds,
        session_cookie_secure: accounts_opts.session_cookie_secure,
        password_min_length: accounts_opts.password_min_length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_action_carries_arguments() {
        temp_env::with_vars(
            [
                ("LEARNING_LOG_SESSION_COOKIE_SECURE", None::<&str>),
                ("LEARNING_LOG_PASSWORD_MIN_LENGTH", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "learning_log",
                    "--port",
                    "3000",
                    "--dsn",
                    "memory://",
                    "--session-ttl-seconds",
                    "60",
                ]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 3000);
                    assert_eq!(args.dsn, "memory://");
                    assert_eq!(args.session_ttl_seconds, 60);
                    assert!(!args.session_cookie_secure);
                    assert_eq!(args.password_min_length, 8);
                }
            },
        );
    }

    #[test]
    fn blank_dsn_is_rejected() {
        let matches =
            crate::cli::commands::new().get_matches_from(vec!["learning_log", "--dsn", "  "]);
        let result = handler(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(
                err.to_string()
                    .contains("missing required argument: --dsn")
            );
        }
    }
}
