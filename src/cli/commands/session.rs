use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if the session secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --session-secret")?;

        Ok(Self { secret })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SESSION_SECRET)
            .long("session-secret")
            .help("HMAC secret used to sign session tokens")
            .env("NAVI_SESSION_SECRET")
            .hide_env_values(true)
            .required(true),
    )
}
