use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_DIRECTORY_URL: &str = "directory-url";
pub const ARG_DIRECTORY_ADMIN_TOKEN: &str = "directory-admin-token";
pub const ARG_DIRECTORY_TIMEOUT_SECONDS: &str = "directory-timeout-seconds";
pub const ARG_VERIFIED_USER_ROLE: &str = "verified-user-role";

/// Directory connection settings taken from the command line or environment.
#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub admin_token: SecretString,
    pub timeout: Duration,
    pub verified_user_role: Option<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if a required directory argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_DIRECTORY_URL)
            .cloned()
            .context("missing required argument: --directory-url")?;

        let admin_token = matches
            .get_one::<String>(ARG_DIRECTORY_ADMIN_TOKEN)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --directory-admin-token")?;

        let timeout = matches
            .get_one::<u64>(ARG_DIRECTORY_TIMEOUT_SECONDS)
            .copied()
            .map_or(crate::cli::globals::DEFAULT_DIRECTORY_TIMEOUT, Duration::from_secs);

        let verified_user_role = matches
            .get_one::<String>(ARG_VERIFIED_USER_ROLE)
            .map(|role| role.trim().to_string())
            .filter(|role| !role.is_empty());

        Ok(Self {
            url,
            admin_token,
            timeout,
            verified_user_role,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DIRECTORY_URL)
                .long("directory-url")
                .help("Base URL of the Directus instance, e.g. https://directus.tld")
                .env("NAVI_DIRECTORY_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DIRECTORY_ADMIN_TOKEN)
                .long("directory-admin-token")
                .help("Static admin token used for user and pending-user lookups")
                .env("NAVI_DIRECTORY_ADMIN_TOKEN")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_DIRECTORY_TIMEOUT_SECONDS)
                .long("directory-timeout-seconds")
                .help("Timeout for each directory request in seconds")
                .env("NAVI_DIRECTORY_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_VERIFIED_USER_ROLE)
                .long("verified-user-role")
                .help("Role id assigned to users created after email verification")
                .env("NAVI_VERIFIED_USER_ROLE"),
        )
}
