//! Compact HMAC-SHA256 session tokens.
//!
//! Tokens follow the `header.claims.signature` layout, each segment base64url
//! without padding. The signature is `HMAC-SHA256(signing_secret, "<header>.<claims>")`.
//! There is no server-side session state: a token is valid until `exp`.

use super::{Error, SecretMaterial};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Fixed token lifetime; re-authentication is required afterwards.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parse a stored role name; anything unknown is rejected.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

/// Identity claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Why a token was refused. Only used for debug events, callers see `Error::TokenInvalid`.
#[derive(Debug, Clone, Copy)]
enum Rejection {
    Format,
    Encoding,
    Signature,
    Header,
    Expired,
}

/// Issues and verifies session tokens.
#[derive(Debug, Clone)]
pub struct TokenService {
    secrets: Arc<SecretMaterial>,
}

impl TokenService {
    #[must_use]
    pub fn new(secrets: Arc<SecretMaterial>) -> Self {
        Self { secrets }
    }

    /// Issue a token valid for [`TOKEN_TTL_SECONDS`] from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, user_id: i64, username: &str, role: Role) -> Result<String, Error> {
        self.issue_at(user_id, username, role, now_unix_seconds())
    }

    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
        now: i64,
    ) -> Result<String, Error> {
        let claims = SessionClaims {
            user_id,
            username: username.to_string(),
            role,
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    /// Returns `Error::TokenInvalid` for any malformed, forged or expired token.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, Error> {
        self.verify_at(token, now_unix_seconds())
    }

    /// # Errors
    /// Returns `Error::TokenInvalid` for any malformed, forged or expired token.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, Error> {
        self.check(token, now).map_err(|rejection| {
            debug!(reason = ?rejection, "session token rejected");
            Error::TokenInvalid
        })
    }

    fn check(&self, token: &str, now: i64) -> Result<SessionClaims, Rejection> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Rejection::Format);
        };

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Rejection::Encoding)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        self.mac(signing_input.as_bytes())
            .map_err(|_| Rejection::Signature)?
            .verify_slice(&signature)
            .map_err(|_| Rejection::Signature)?;

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(Rejection::Header);
        }

        let claims: SessionClaims = b64d_json(claims_b64)?;
        if claims.exp < now {
            return Err(Rejection::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, Error> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secrets.signing_secret())
            .map_err(|_| Error::KeyLength)?;
        mac.update(data);
        Ok(mac)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Rejection> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Rejection::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|_| Rejection::Encoding)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    const NOW: i64 = 1_700_000_000;

    fn service(secret: &str) -> Result<TokenService, Error> {
        let secrets = SecretMaterial::new(
            SecretString::from(secret),
            SecretString::from("field-key"),
        )?;
        Ok(TokenService::new(Arc::new(secrets)))
    }

    fn flip_char(segment: &str, index: usize) -> String {
        segment
            .char_indices()
            .map(|(i, c)| {
                if i == index {
                    if c == 'A' { 'B' } else { 'A' }
                } else {
                    c
                }
            })
            .collect()
    }

    #[test]
    fn issue_and_verify_roundtrip() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(1, "alice", Role::Admin, NOW)?;

        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));

        let claims = tokens.verify_at(&token, NOW)?;
        assert_eq!(
            claims,
            SessionClaims {
                user_id: 1,
                username: "alice".to_string(),
                role: Role::Admin,
                iat: NOW,
                exp: NOW + TOKEN_TTL_SECONDS,
            }
        );
        Ok(())
    }

    #[test]
    fn header_and_claims_wire_format() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(7, "bob", Role::User, NOW)?;
        let mut parts = token.split('.');

        let header = Base64UrlUnpadded::decode_vec(parts.next().unwrap_or_default())
            .map_err(|_| Error::TokenInvalid)?;
        assert_eq!(header, br#"{"alg":"HS256","typ":"JWT"}"#);

        let claims: serde_json::Value = serde_json::from_slice(
            &Base64UrlUnpadded::decode_vec(parts.next().unwrap_or_default())
                .map_err(|_| Error::TokenInvalid)?,
        )?;
        assert_eq!(claims["userId"], 7);
        assert_eq!(claims["username"], "bob");
        assert_eq!(claims["role"], "user");
        assert_eq!(claims["iat"], NOW);
        assert_eq!(claims["exp"], NOW + 86_400);
        Ok(())
    }

    #[test]
    fn expiry_boundary() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(1, "alice", Role::User, NOW)?;

        assert!(tokens.verify_at(&token, NOW + 86_399).is_ok());
        assert!(tokens.verify_at(&token, NOW + 86_400).is_ok());
        assert!(matches!(
            tokens.verify_at(&token, NOW + 86_401),
            Err(Error::TokenInvalid)
        ));
        Ok(())
    }

    #[test]
    fn tampered_segments_are_rejected() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(1, "alice", Role::User, NOW)?;
        let parts: Vec<&str> = token.split('.').collect();

        for segment in 0..3 {
            for index in [0, parts[segment].len() / 2, parts[segment].len() - 1] {
                let mut forged: Vec<String> = parts.iter().map(ToString::to_string).collect();
                forged[segment] = flip_char(parts[segment], index);
                let forged = forged.join(".");
                assert!(
                    tokens.verify_at(&forged, NOW).is_err(),
                    "segment {segment} index {index} should be rejected"
                );
            }
        }
        Ok(())
    }

    #[test]
    fn role_escalation_is_rejected() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(2, "mallory", Role::User, NOW)?;
        let parts: Vec<&str> = token.split('.').collect();

        let escalated = b64e_json(&SessionClaims {
            user_id: 2,
            username: "mallory".to_string(),
            role: Role::Admin,
            iat: NOW,
            exp: NOW + TOKEN_TTL_SECONDS,
        })?;
        let forged = format!("{}.{}.{}", parts[0], escalated, parts[2]);
        assert!(tokens.verify_at(&forged, NOW).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<(), Error> {
        let issuer = service("first-secret")?;
        let verifier = service("second-secret")?;
        let token = issuer.issue_at(1, "alice", Role::User, NOW)?;
        assert!(verifier.verify_at(&token, NOW).is_err());
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_rejected() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let token = tokens.issue_at(1, "alice", Role::User, NOW)?;

        for candidate in [
            String::new(),
            "abc".to_string(),
            "a.b".to_string(),
            "a.b.c".to_string(),
            format!("{token}.extra"),
            token.replace('.', ""),
        ] {
            assert!(matches!(
                tokens.verify_at(&candidate, NOW),
                Err(Error::TokenInvalid)
            ));
        }
        Ok(())
    }

    #[test]
    fn signed_garbage_claims_are_rejected() -> Result<(), Error> {
        let tokens = service("signing-secret")?;
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = Base64UrlUnpadded::encode_string(b"not json");
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = tokens.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let token = format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        );
        assert!(tokens.verify_at(&token, NOW).is_err());
        Ok(())
    }

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" User "), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
