//! Client and audit-log queries.

use super::types::{ClientRecord, SsnDisplay, ValidClient};
use crate::crypto::FieldCipher;
use serde_json::{Value, json};
use sqlx::{Executor, PgConnection, PgPool, Postgres, Row, postgres::PgRow};
use tracing::warn;

const CLIENT_COLUMNS: &str = r#"
    id,
    first_name,
    last_name,
    telephone,
    email,
    address,
    city,
    state,
    zip_code,
    date_of_birth,
    social_security_number,
    status,
    created_by,
    updated_by,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

#[derive(Debug, Clone, Copy)]
pub(super) enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// A stored client, SSN still sealed.
pub(super) struct ClientRow {
    id: i64,
    first_name: String,
    last_name: String,
    telephone: String,
    email: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    date_of_birth: String,
    ssn_envelope: String,
    status: String,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ClientRow {
    fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            telephone: row.get("telephone"),
            email: row.get("email"),
            address: row.get("address"),
            city: row.get("city"),
            state: row.get("state"),
            zip_code: row.get("zip_code"),
            date_of_birth: row.get("date_of_birth"),
            ssn_envelope: row.get("social_security_number"),
            status: row.get("status"),
            created_by: row.get("created_by"),
            updated_by: row.get("updated_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    pub(super) fn ssn_envelope(&self) -> &str {
        &self.ssn_envelope
    }

    /// Audit view of the stored row; the SSN envelope is left out entirely.
    pub(super) fn audit_snapshot(&self) -> Value {
        json!({
            "id": self.id,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "telephone": self.telephone,
            "email": self.email,
            "address": self.address,
            "city": self.city,
            "state": self.state,
            "zip_code": self.zip_code,
            "date_of_birth": self.date_of_birth,
            "status": self.status,
        })
    }

    pub(super) fn into_record(self, cipher: &FieldCipher) -> ClientRecord {
        let ssn = SsnDisplay::reveal(cipher, &self.ssn_envelope);
        if !ssn.is_available() {
            warn!(client_id = self.id, "stored SSN could not be decrypted");
        }

        ClientRecord {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            telephone: self.telephone,
            email: self.email,
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            date_of_birth: self.date_of_birth,
            social_security_number: ssn,
            status: self.status,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Escape `LIKE` wildcards so user input only ever matches literally.
pub(super) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub(super) async fn list_clients(
    pool: &PgPool,
    search: Option<&str>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ClientRow>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {CLIENT_COLUMNS}
        FROM clients
        WHERE ($1::TEXT IS NULL
               OR first_name ILIKE $1
               OR last_name ILIKE $1
               OR telephone ILIKE $1
               OR date_of_birth ILIKE $1)
          AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "
    );
    let rows = sqlx::query(&query)
        .bind(search.map(like_pattern))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(ClientRow::from_row).collect())
}

pub(super) async fn fetch_client<'e, E>(
    executor: E,
    client_id: i64,
    for_update: bool,
) -> Result<Option<ClientRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let query = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 {lock}");
    let row = sqlx::query(&query)
        .bind(client_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.as_ref().map(ClientRow::from_row))
}

pub(super) async fn insert_client(
    conn: &mut PgConnection,
    client: &ValidClient,
    ssn_envelope: &str,
    actor: &str,
) -> Result<i64, sqlx::Error> {
    let query = r"
        INSERT INTO clients (
            first_name, last_name, telephone, email, address,
            city, state, zip_code, date_of_birth, social_security_number,
            status, created_by, updated_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.telephone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.state)
        .bind(&client.zip_code)
        .bind(&client.date_of_birth)
        .bind(ssn_envelope)
        .bind(&client.status)
        .bind(actor)
        .fetch_one(conn)
        .await?;
    Ok(row.get("id"))
}

pub(super) async fn update_client(
    conn: &mut PgConnection,
    client_id: i64,
    client: &ValidClient,
    ssn_envelope: &str,
    actor: &str,
) -> Result<(), sqlx::Error> {
    let query = r"
        UPDATE clients SET
            first_name = $1,
            last_name = $2,
            telephone = $3,
            email = $4,
            address = $5,
            city = $6,
            state = $7,
            zip_code = $8,
            date_of_birth = $9,
            social_security_number = $10,
            status = $11,
            updated_by = $12,
            updated_at = NOW()
        WHERE id = $13
    ";
    sqlx::query(query)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.telephone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.state)
        .bind(&client.zip_code)
        .bind(&client.date_of_birth)
        .bind(ssn_envelope)
        .bind(&client.status)
        .bind(actor)
        .bind(client_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn delete_client(
    conn: &mut PgConnection,
    client_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(client_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn write_audit(
    conn: &mut PgConnection,
    user_id: i64,
    action: AuditAction,
    record_id: i64,
    changes: &Value,
) -> Result<(), sqlx::Error> {
    let query = r"
        INSERT INTO audit_logs (user_id, action, table_name, record_id, changes)
        VALUES ($1, $2, 'clients', $3, $4::JSONB)
    ";
    sqlx::query(query)
        .bind(user_id)
        .bind(action.as_str())
        .bind(record_id)
        .bind(changes.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("doe"), "%doe%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
    }

    #[test]
    fn audit_actions() {
        assert_eq!(AuditAction::Create.as_str(), "CREATE");
        assert_eq!(AuditAction::Update.as_str(), "UPDATE");
        assert_eq!(AuditAction::Delete.as_str(), "DELETE");
    }
}
