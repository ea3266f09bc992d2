//! Free-text notes attached to a client.

use super::{
    ErrorBody, JsonBody, MessageBody, ServiceError, auth::Principal, normalize_optional,
    page_bounds,
};
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_NOTE_TYPE: &str = "general";

#[derive(Debug, Deserialize, ToSchema)]
pub struct NoteRequest {
    pub note_text: Option<String>,
    pub note_type: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Note {
    pub id: i64,
    pub client_id: i64,
    pub note_text: String,
    pub note_type: String,
    pub created_by: String,
    pub is_private: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NoteList {
    pub notes: Vec<Note>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedNote {
    pub message: String,
    #[serde(rename = "noteId")]
    pub note_id: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoteQuery {
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl NoteRequest {
    /// Returns `(text, type)` or the message for a blank note.
    fn validate(self) -> Result<(String, String), ServiceError> {
        let text = self
            .note_text
            .filter(|text| !text.trim().is_empty())
            .ok_or(ServiceError::BadRequest("Note text is required"))?;
        let note_type =
            normalize_optional(self.note_type).unwrap_or_else(|| DEFAULT_NOTE_TYPE.to_string());
        Ok((text, note_type))
    }
}

fn note_from_row(row: &PgRow) -> Note {
    Note {
        id: row.get("id"),
        client_id: row.get("client_id"),
        note_text: row.get("note_text"),
        note_type: row.get("note_type"),
        created_by: row.get("created_by"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
    }
}

#[utoipa::path(
    post,
    path = "/api/clients/{id}/notes",
    params(("id" = i64, Path, description = "Client id")),
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note added", body = CreatedNote),
        (status = 400, description = "Note text is required", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Client not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn create_note(
    Path(client_id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    JsonBody(request): JsonBody<NoteRequest>,
) -> Response {
    let result = async {
        let is_private = request.is_private;
        let (text, note_type) = request.validate()?;
        insert_note(&pool, client_id, &text, &note_type, &principal.username, is_private).await
    }
    .await;

    match result {
        Ok(note_id) => {
            info!(note_id, client_id, actor = principal.user_id, "note added");
            (
                StatusCode::CREATED,
                Json(CreatedNote {
                    message: "Note added successfully".to_string(),
                    note_id,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}/notes",
    params(("id" = i64, Path, description = "Client id"), NoteQuery),
    responses(
        (status = 200, description = "Notes, newest first", body = NoteList),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn list_notes(
    Path(client_id): Path<i64>,
    Extension(_principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<NoteQuery>,
) -> Response {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let note_type = normalize_optional(query.note_type);

    let sql = r#"
        SELECT
            id,
            client_id,
            note_text,
            note_type,
            created_by,
            is_private,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM notes
        WHERE client_id = $1
          AND ($2::TEXT IS NULL OR note_type = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
    "#;
    let rows = sqlx::query(sql)
        .bind(client_id)
        .bind(note_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await;

    match rows {
        Ok(rows) => {
            let notes: Vec<Note> = rows.iter().map(note_from_row).collect();
            (
                StatusCode::OK,
                Json(NoteList {
                    total: notes.len(),
                    notes,
                }),
            )
                .into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/notes/{note_id}",
    params(("note_id" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note deleted", body = MessageBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Note not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn delete_note(
    Path(note_id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let result = sqlx::query("DELETE FROM notes WHERE id = $1")
        .bind(note_id)
        .execute(&pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            ServiceError::NotFound("Note not found").into_response()
        }
        Ok(_) => {
            info!(note_id, actor = principal.user_id, "note deleted");
            (StatusCode::OK, MessageBody::new("Note deleted successfully")).into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

async fn insert_note(
    pool: &PgPool,
    client_id: i64,
    text: &str,
    note_type: &str,
    actor: &str,
    is_private: bool,
) -> Result<i64, ServiceError> {
    let exists = sqlx::query("SELECT id FROM clients WHERE id = $1")
        .bind(client_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(ServiceError::NotFound("Client not found"));
    }

    let query = r"
        INSERT INTO notes (client_id, note_text, note_type, created_by, is_private)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(client_id)
        .bind(text)
        .bind(note_type)
        .bind(actor)
        .bind(is_private)
        .fetch_one(pool)
        .await?;
    Ok(row.get("id"))
}
