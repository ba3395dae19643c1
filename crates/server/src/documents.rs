//! Document attachment endpoints. Bytes travel as standard base64.

use api_types::document::{DocumentContent, DocumentNew, DocumentView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use base64::{Engine as _, prelude::BASE64_STANDARD};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, views};

pub async fn attach(
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<DocumentNew>,
) -> Result<(StatusCode, Json<DocumentView>), ServerError> {
    let bytes = BASE64_STANDARD
        .decode(payload.content_base64.trim())
        .map_err(|err| ServerError::Generic(format!("content is not valid base64: {err}")))?;
    let filename = payload.filename;
    let doc = state
        .mutate(move |engine| async move {
            engine
                .attach_document(transaction_id, &bytes, &filename)
                .await
        })
        .await?;
    tracing::info!(id = %doc.id, %transaction_id, size = doc.size_bytes, "document attached");

    Ok((StatusCode::CREATED, Json(views::document(doc))))
}

pub async fn download(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentContent>, ServerError> {
    let (doc, bytes) = state.engine.document_content(id).await?;
    Ok(Json(DocumentContent {
        document: views::document(doc),
        content_base64: BASE64_STANDARD.encode(bytes),
    }))
}

pub async fn detach(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentView>, ServerError> {
    let doc = state
        .mutate(move |engine| async move { engine.detach_document(id).await })
        .await?;
    tracing::info!(%id, "document detached");

    Ok(Json(views::document(doc)))
}
