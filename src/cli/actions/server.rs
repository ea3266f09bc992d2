use crate::{api, cli::telemetry, crypto::SecretMaterial};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fmt, sync::Arc};
use tracing::debug;
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub signing_secret: SecretString,
    pub encryption_key: SecretString,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &redact_dsn(&self.dsn))
            .field("frontend_base_url", &self.frontend_base_url)
            .field("signing_secret", &self.signing_secret)
            .field("encryption_key", &self.encryption_key)
            .finish()
    }
}

/// The DSN with any password replaced; unparseable values are hidden entirely.
fn redact_dsn(dsn: &str) -> String {
    let Ok(mut url) = Url::parse(dsn) else {
        return "***".to_string();
    };
    if url.password().is_some() && url.set_password(Some("***")).is_err() {
        return "***".to_string();
    }
    url.to_string()
}

/// Execute the server action.
/// # Errors
/// Returns an error if a secret is empty, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let secrets = SecretMaterial::new(args.signing_secret, args.encryption_key)
        .context("Invalid secret configuration")?;

    debug!(
        port = args.port,
        frontend_base_url = %args.frontend_base_url,
        "starting server"
    );

    let result = api::new(
        args.port,
        args.dsn,
        Arc::new(secrets),
        args.frontend_base_url,
    )
    .await;

    // Flush pending spans whether the server exited cleanly or not.
    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_credentials() {
        let args = Args {
            port: 8080,
            dsn: "postgres://custodian:hunter22@db:5432/custodian".to_string(),
            frontend_base_url: "http://localhost:3000".to_string(),
            signing_secret: SecretString::from("signing-value"),
            encryption_key: SecretString::from("encryption-value"),
        };
        let rendered = format!("{args:?}");
        assert!(rendered.contains("postgres://custodian:***@db:5432/custodian"));
        for secret in ["hunter22", "signing-value", "encryption-value"] {
            assert!(!rendered.contains(secret), "{rendered}");
        }
        assert_eq!(redact_dsn("not a url"), "***");
        assert_eq!(
            redact_dsn("postgres://custodian@db/custodian"),
            "postgres://custodian@db/custodian"
        );
    }

    #[tokio::test]
    async fn empty_secret_aborts_before_connecting() {
        let args = Args {
            port: 0,
            dsn: "postgres://unused@127.0.0.1:1/unused".to_string(),
            frontend_base_url: "http://localhost:3000".to_string(),
            signing_secret: SecretString::from(""),
            encryption_key: SecretString::from("key"),
        };

        let err = execute(args).await.err();
        assert!(err.is_some_and(|err| err.to_string() == "Invalid secret configuration"));
    }
}
