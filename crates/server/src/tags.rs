//! Tag and tag group endpoints

use api_types::tag::{
    TagGroupListResponse, TagGroupNew, TagGroupUpdate, TagGroupView, TagListResponse, TagNew,
    TagUpdate, TagView,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::TagPatch;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, views};

pub async fn list_groups(
    State(state): State<ServerState>,
) -> Result<Json<TagGroupListResponse>, ServerError> {
    let groups = state
        .engine
        .tag_groups()
        .await?
        .into_iter()
        .map(views::tag_group)
        .collect();
    Ok(Json(TagGroupListResponse { groups }))
}

pub async fn create_group(
    State(state): State<ServerState>,
    Json(payload): Json<TagGroupNew>,
) -> Result<(StatusCode, Json<TagGroupView>), ServerError> {
    let group = state
        .mutate(move |engine| async move { engine.create_tag_group(&payload.name).await })
        .await?;
    tracing::info!(id = %group.id, "tag group created");

    Ok((StatusCode::CREATED, Json(views::tag_group(group))))
}

pub async fn rename_group(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TagGroupUpdate>,
) -> Result<Json<TagGroupView>, ServerError> {
    let group = state
        .mutate(move |engine| async move { engine.rename_tag_group(id, &payload.name).await })
        .await?;
    tracing::info!(%id, "tag group renamed");

    Ok(Json(views::tag_group(group)))
}

pub async fn delete_group(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .mutate(move |engine| async move { engine.delete_tag_group(id).await })
        .await?;
    tracing::info!(%id, "tag group deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<TagListResponse>, ServerError> {
    let tags = state
        .engine
        .tags()
        .await?
        .into_iter()
        .map(views::tag)
        .collect();
    Ok(Json(TagListResponse { tags }))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TagNew>,
) -> Result<(StatusCode, Json<TagView>), ServerError> {
    let tag = state
        .mutate(move |engine| async move {
            engine
                .create_tag(payload.tag_group_id, &payload.name, &payload.color)
                .await
        })
        .await?;
    tracing::info!(id = %tag.id, group = %tag.tag_group_id, "tag created");

    Ok((StatusCode::CREATED, Json(views::tag(tag))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TagUpdate>,
) -> Result<Json<TagView>, ServerError> {
    let patch = TagPatch {
        name: payload.name,
        color: payload.color,
        tag_group_id: payload.tag_group_id,
    };
    let tag = state
        .mutate(move |engine| async move { engine.update_tag(id, patch).await })
        .await?;
    tracing::info!(%id, "tag updated");

    Ok(Json(views::tag(tag)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .mutate(move |engine| async move { engine.delete_tag(id).await })
        .await?;
    tracing::info!(%id, "tag deleted");

    Ok(StatusCode::NO_CONTENT)
}
