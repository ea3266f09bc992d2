//! Client records with an encrypted SSN column.
//!
//! Flow Overview:
//! 1) Validate the body and strip formatting from telephone and SSN.
//! 2) Seal the SSN with [`FieldCipher`] before it reaches SQL.
//! 3) Write the row and an `audit_logs` entry in one transaction (SSN redacted).
//! 4) On read, decrypt and return only `***-**-NNNN`.

mod storage;
pub mod types;

use super::{
    ErrorBody, JsonBody, MessageBody, ServiceError, ValidationErrorBody, auth::Principal,
    is_unique_violation, normalize_optional, page_bounds,
};
use crate::crypto::FieldCipher;
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use storage::AuditAction;
use tracing::info;
use types::{ClientInput, ClientList, ClientQuery, ClientRecord, CreatedClient, SsnRule};

#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = ClientInput,
    responses(
        (status = 201, description = "Client created", body = CreatedClient),
        (status = 400, description = "Validation failed", body = ValidationErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 409, description = "Duplicate client", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "clients"
)]
pub async fn create_client(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(cipher): Extension<Arc<FieldCipher>>,
    JsonBody(input): JsonBody<ClientInput>,
) -> Response {
    match create(&pool, &cipher, &principal, input).await {
        Ok(client_id) => (
            StatusCode::CREATED,
            Json(CreatedClient {
                message: "Client created successfully".to_string(),
                client_id,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/clients",
    params(ClientQuery),
    responses(
        (status = 200, description = "Clients, newest first, SSN masked", body = ClientList),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "clients"
)]
pub async fn list_clients(
    Extension(_principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(cipher): Extension<Arc<FieldCipher>>,
    Query(query): Query<ClientQuery>,
) -> Response {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let search = normalize_optional(query.search);
    let status = normalize_optional(query.status);

    match storage::list_clients(&pool, search.as_deref(), status.as_deref(), limit, offset).await
    {
        Ok(rows) => {
            let clients: Vec<ClientRecord> =
                rows.into_iter().map(|row| row.into_record(&cipher)).collect();
            (
                StatusCode::OK,
                Json(ClientList {
                    total: clients.len(),
                    clients,
                    limit,
                    offset,
                }),
            )
                .into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    params(("id" = i64, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client with masked SSN", body = ClientRecord),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Client not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "clients"
)]
pub async fn get_client(
    Path(id): Path<i64>,
    Extension(_principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(cipher): Extension<Arc<FieldCipher>>,
) -> Response {
    match storage::fetch_client(&pool, id, false).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row.into_record(&cipher))).into_response(),
        Ok(None) => ServiceError::NotFound("Client not found").into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    params(("id" = i64, Path, description = "Client id")),
    request_body = ClientInput,
    responses(
        (status = 200, description = "Client updated", body = MessageBody),
        (status = 400, description = "Validation failed", body = ValidationErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Client not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "clients"
)]
pub async fn update_client(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(cipher): Extension<Arc<FieldCipher>>,
    JsonBody(input): JsonBody<ClientInput>,
) -> Response {
    match update(&pool, &cipher, &principal, id, input).await {
        Ok(()) => (StatusCode::OK, MessageBody::new("Client updated successfully")).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    params(("id" = i64, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client deleted", body = MessageBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Client not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "clients"
)]
pub async fn delete_client(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match delete(&pool, &principal, id).await {
        Ok(()) => (StatusCode::OK, MessageBody::new("Client deleted successfully")).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create(
    pool: &PgPool,
    cipher: &FieldCipher,
    principal: &Principal,
    input: ClientInput,
) -> Result<i64, ServiceError> {
    let client = input
        .validate(SsnRule::Required)
        .map_err(ServiceError::Validation)?;
    let Some(ssn_digits) = client.ssn_digits.as_deref() else {
        return Err(ServiceError::Validation(vec![
            "Valid 9-digit social security number is required",
        ]));
    };
    let envelope = cipher.encrypt(ssn_digits)?;

    let mut tx = pool.begin().await?;
    let client_id = storage::insert_client(&mut tx, &client, &envelope, &principal.username)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Conflict("Client with this telephone or SSN already exists")
            } else {
                ServiceError::Database(err)
            }
        })?;
    storage::write_audit(
        &mut tx,
        principal.user_id,
        AuditAction::Create,
        client_id,
        &json!({ "created": client.audit_snapshot() }),
    )
    .await?;
    tx.commit().await?;

    info!(client_id, actor = principal.user_id, "client created");
    Ok(client_id)
}

async fn update(
    pool: &PgPool,
    cipher: &FieldCipher,
    principal: &Principal,
    client_id: i64,
    input: ClientInput,
) -> Result<(), ServiceError> {
    let client = input
        .validate(SsnRule::Optional)
        .map_err(ServiceError::Validation)?;

    let mut tx = pool.begin().await?;
    let Some(existing) = storage::fetch_client(&mut *tx, client_id, true).await? else {
        return Err(ServiceError::NotFound("Client not found"));
    };

    let envelope = match client.ssn_digits.as_deref() {
        Some(digits) => cipher.encrypt(digits)?,
        None => existing.ssn_envelope().to_string(),
    };

    storage::update_client(&mut tx, client_id, &client, &envelope, &principal.username)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Conflict("Client with this telephone or SSN already exists")
            } else {
                ServiceError::Database(err)
            }
        })?;
    storage::write_audit(
        &mut tx,
        principal.user_id,
        AuditAction::Update,
        client_id,
        &json!({
            "before": existing.audit_snapshot(),
            "after": client.audit_snapshot(),
        }),
    )
    .await?;
    tx.commit().await?;

    info!(client_id, actor = principal.user_id, "client updated");
    Ok(())
}

async fn delete(pool: &PgPool, principal: &Principal, client_id: i64) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;
    let Some(existing) = storage::fetch_client(&mut *tx, client_id, true).await? else {
        return Err(ServiceError::NotFound("Client not found"));
    };

    if !storage::delete_client(&mut tx, client_id).await? {
        return Err(ServiceError::NotFound("Client not found"));
    }
    storage::write_audit(
        &mut tx,
        principal.user_id,
        AuditAction::Delete,
        client_id,
        &json!({ "deleted": existing.audit_snapshot() }),
    )
    .await?;
    tx.commit().await?;

    info!(client_id, actor = principal.user_id, "client deleted");
    Ok(())
}
