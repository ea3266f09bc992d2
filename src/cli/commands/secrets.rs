use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_SECRET: &str = "signing-secret";
pub const ARG_ENCRYPTION_KEY: &str = "encryption-key";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_SECRET)
                .long(ARG_SIGNING_SECRET)
                .help("HMAC secret used to sign session tokens")
                .env("CUSTODIAN_SIGNING_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENCRYPTION_KEY)
                .long(ARG_ENCRYPTION_KEY)
                .help("Key material for field-level encryption (padded or truncated to 32 bytes)")
                .env("CUSTODIAN_ENCRYPTION_KEY")
                .hide_env_values(true)
                .required(true),
        )
}

/// Secrets as parsed from the command line, wrapped before anything else sees them.
#[derive(Debug)]
pub struct Options {
    pub signing_secret: SecretString,
    pub encryption_key: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if either secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let signing_secret = matches
            .get_one::<String>(ARG_SIGNING_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --signing-secret")?;
        let encryption_key = matches
            .get_one::<String>(ARG_ENCRYPTION_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --encryption-key")?;

        Ok(Self {
            signing_secret,
            encryption_key,
        })
    }
}
