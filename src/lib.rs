//! # Navi (registration and login front end)
//!
//! `navi` fronts a Directus instance (the directory) with a small JSON API for
//! signing up, confirming an email address, logging in and reading the current
//! session.
//!
//! ## Registration
//!
//! Signing up is two-phase. A new email first becomes a *pending* record in the
//! `temp_users` collection together with a random verification token; only
//! confirming that token promotes it to a real directory user.
//!
//! - **One identity per email:** the verified `users` collection is checked
//!   before `temp_users`, and the first hit wins. A verified hit asks the user
//!   to log in, a pending hit says the address is awaiting verification.
//! - **Fail closed:** if an existence check cannot be completed the registration
//!   fails; it is never treated as "not found".
//!
//! ## Sessions
//!
//! Successful logins receive an HS256-signed token valid for one hour. Sessions
//! are stateless: nothing is stored server side, so logging out only clears the
//! cookie on the client.

pub mod api;
pub mod cli;
pub mod directory;
pub mod registration;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
