//! Client payloads, validation and SSN display.

use crate::crypto::FieldCipher;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use std::sync::LazyLock;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_STATUS: &str = "active";

// `[0-9]`, not `\d`: the latter also matches non-ASCII Unicode digits.
static DATE_OF_BIRTH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").ok());

/// Raw create/update body. Every field is optional here so that missing values turn into
/// validation messages instead of deserialization failures.
#[derive(Default, Deserialize, ToSchema)]
pub struct ClientInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub date_of_birth: Option<String>,
    pub social_security_number: Option<String>,
    pub status: Option<String>,
}

impl std::fmt::Debug for ClientInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInput")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("status", &self.status)
            .field("social_security_number", &"***")
            .finish_non_exhaustive()
    }
}

/// A validated client. The SSN is digits only and is dropped from every audit snapshot.
pub struct ValidClient {
    pub first_name: String,
    pub last_name: String,
    pub telephone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub date_of_birth: String,
    pub ssn_digits: Option<String>,
    pub status: String,
}

impl ValidClient {
    /// JSON snapshot for `audit_logs.changes` with the SSN redacted.
    #[must_use]
    pub fn audit_snapshot(&self) -> Value {
        json!({
            "first_name": self.first_name,
            "last_name": self.last_name,
            "telephone": self.telephone,
            "email": self.email,
            "address": self.address,
            "city": self.city,
            "state": self.state,
            "zip_code": self.zip_code,
            "date_of_birth": self.date_of_birth,
            "social_security_number": self.ssn_digits.as_ref().map(|_| REDACTED),
            "status": self.status,
        })
    }
}

pub const REDACTED: &str = "[REDACTED]";

/// SSN requirement differs between create (required) and update (keep the stored value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsnRule {
    Required,
    Optional,
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn valid_date_of_birth(value: &str) -> bool {
    DATE_OF_BIRTH
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

impl ClientInput {
    /// Validate and normalize the body, collecting every problem found.
    ///
    /// # Errors
    /// Returns the list of human-readable validation messages.
    pub fn validate(self, ssn_rule: SsnRule) -> Result<ValidClient, Vec<&'static str>> {
        let mut errors = Vec::new();

        let first_name = non_blank(self.first_name.as_ref());
        if first_name.is_none() {
            errors.push("First name is required");
        }

        let last_name = non_blank(self.last_name.as_ref());
        if last_name.is_none() {
            errors.push("Last name is required");
        }

        let telephone = self.telephone.as_deref().map(digits_only);
        if telephone.as_ref().is_none_or(|digits| digits.len() != 10) {
            errors.push("Valid 10-digit telephone number is required");
        }

        let date_of_birth = self.date_of_birth.as_deref().map(str::trim);
        if !date_of_birth.is_some_and(valid_date_of_birth) {
            errors.push("Valid date of birth (YYYY-MM-DD) is required");
        }

        let ssn_digits = self
            .social_security_number
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(digits_only);
        match (&ssn_digits, ssn_rule) {
            (Some(digits), _) if digits.len() != 9 => {
                errors.push("Valid 9-digit social security number is required");
            }
            (None, SsnRule::Required) => {
                errors.push("Valid 9-digit social security number is required");
            }
            _ => {}
        }

        match (first_name, last_name, telephone, date_of_birth) {
            (Some(first_name), Some(last_name), Some(telephone), Some(date_of_birth))
                if errors.is_empty() =>
            {
                Ok(ValidClient {
                    first_name,
                    last_name,
                    telephone,
                    email: non_blank(self.email.as_ref()),
                    address: non_blank(self.address.as_ref()),
                    city: non_blank(self.city.as_ref()),
                    state: non_blank(self.state.as_ref()),
                    zip_code: non_blank(self.zip_code.as_ref()),
                    date_of_birth: date_of_birth.to_string(),
                    ssn_digits,
                    status: non_blank(self.status.as_ref())
                        .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
                })
            }
            _ => Err(errors),
        }
    }
}

/// What a reader sees in place of the stored SSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsnDisplay {
    /// Last four digits of a successfully decrypted SSN.
    Masked(String),
    /// The envelope could not be decrypted (wrong key, corrupt row, or too few digits).
    Unavailable,
}

impl SsnDisplay {
    /// Decrypt an envelope and keep only its last four characters.
    #[must_use]
    pub fn reveal(cipher: &FieldCipher, envelope: &str) -> Self {
        match cipher.decrypt(envelope) {
            Ok(plaintext) => Self::from_plaintext(&plaintext),
            Err(_) => Self::Unavailable,
        }
    }

    fn from_plaintext(plaintext: &str) -> Self {
        let chars: Vec<char> = plaintext.chars().collect();
        if chars.len() < 4 {
            return Self::Unavailable;
        }
        Self::Masked(chars[chars.len() - 4..].iter().collect())
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Masked(_))
    }
}

impl std::fmt::Display for SsnDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Masked(last4) => write!(f, "***-**-{last4}"),
            Self::Unavailable => f.write_str("***-**-****"),
        }
    }
}

impl Serialize for SsnDisplay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A client as returned to readers; the SSN only ever appears masked.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClientRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub telephone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub date_of_birth: String,
    #[schema(value_type = String, example = "***-**-6789")]
    pub social_security_number: SsnDisplay,
    pub status: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientList {
    pub clients: Vec<ClientRecord>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedClient {
    pub message: String,
    #[serde(rename = "clientId")]
    pub client_id: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClientQuery {
    /// Matches first name, last name, telephone or date of birth (case-insensitive).
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
