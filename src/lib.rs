//! # Custodian (Client Record Management API)
//!
//! `custodian` stores client records on behalf of authenticated staff. The sensitive
//! parts of the system live in [`crypto`]:
//!
//! - **Passwords:** salted bcrypt (cost 10), verified in constant time by bcrypt itself.
//! - **Session tokens:** compact `header.claims.signature` tokens signed with HMAC-SHA256,
//!   valid for 24 hours. The server keeps no session state.
//! - **Field encryption:** the social security number column is sealed with AES-256-GCM
//!   under a fresh 96-bit nonce per write. Reads only ever return the last four digits.
//!
//! ## Authorization
//!
//! Every `/api` route except login, registration and token verification passes through
//! the bearer-token gateway. Roles are `admin` and `user`; user management and database
//! statistics are admin-only and answer `403` to everyone else.

pub mod api;
pub mod cli;
pub mod crypto;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
