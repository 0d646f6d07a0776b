use crate::{
    api,
    cli::{
        commands::{directory, session},
        globals::GlobalArgs,
    },
};
use anyhow::Result;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub directory: directory::Options,
    pub session: session::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(
        &args.directory.url,
        args.directory.admin_token,
        args.session.secret,
    )?
    .with_directory_timeout(args.directory.timeout)
    .with_verified_user_role(args.directory.verified_user_role);

    log_startup(args.port, &globals);
    debug!("Global args: {:?}", globals);

    api::new(args.port, &globals).await
}

fn log_startup(port: u16, globals: &GlobalArgs) {
    let entries = [
        ("listen", format!("tcp:{port}")),
        ("directory_url", redact_url(&globals.directory_url)),
        (
            "directory_timeout",
            format!("{}s", globals.directory_timeout.as_secs()),
        ),
        (
            "verified_user_role",
            globals
                .verified_user_role
                .clone()
                .unwrap_or_else(|| "directory default".to_string()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-url".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
