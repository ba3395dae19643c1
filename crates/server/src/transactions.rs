//! Transactions API endpoints

use api_types::transaction::{
    SplitRequest, SplitResponse, TagAssign, TagLinkResponse, TransactionDeleted,
    TransactionListQuery, TransactionListResponse, TransactionNew, TransactionUpdate,
    TransactionView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{NewTransaction, TransactionFilter, TransactionPatch};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, views};

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let filter = TransactionFilter {
        from: query.from,
        to: query.to,
        tag_id: query.tag_id,
        parent_id: query.parent_id,
    };
    let transactions = state
        .engine
        .transactions(filter)
        .await?
        .into_iter()
        .map(|view| views::transaction(view, state.locale))
        .collect();

    Ok(Json(TransactionListResponse { transactions }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let view = state.engine.transaction(id).await?;
    Ok(Json(views::transaction(view, state.locale)))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let cmd = NewTransaction {
        date: payload.date,
        amount: views::amount_input(payload.amount),
        description: payload.description,
        note: payload.note,
    };
    let view = state
        .mutate(move |engine| async move {
            let tx = engine.create_transaction(cmd).await?;
            engine.transaction(tx.id).await
        })
        .await?;
    tracing::info!(id = %view.transaction.id, "transaction created");

    Ok((
        StatusCode::CREATED,
        Json(views::transaction(view, state.locale)),
    ))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<Json<TransactionView>, ServerError> {
    let patch = TransactionPatch {
        date: payload.date,
        amount: payload.amount.map(views::amount_input),
        description: payload.description,
        note: payload.note,
    };
    let view = state
        .mutate(move |engine| async move {
            engine.update_transaction(id, patch).await?;
            engine.transaction(id).await
        })
        .await?;
    tracing::info!(%id, "transaction updated");

    Ok(Json(views::transaction(view, state.locale)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionDeleted>, ServerError> {
    let deleted = state
        .mutate(move |engine| async move { engine.delete_transaction(id).await })
        .await?;
    tracing::info!(%id, count = deleted.len(), "transaction deleted");

    Ok(Json(TransactionDeleted { deleted }))
}

pub async fn add_tag(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TagAssign>,
) -> Result<Json<TagLinkResponse>, ServerError> {
    let tag_id = payload.tag_id;
    let link = state
        .mutate(move |engine| async move { engine.add_tag(id, tag_id).await })
        .await?;
    if link.changed() {
        tracing::info!(%id, %tag_id, "tag added to transaction");
    }

    Ok(Json(TagLinkResponse {
        outcome: views::tag_link(link),
        changed: link.changed(),
    }))
}

pub async fn remove_tag(
    State(state): State<ServerState>,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TagLinkResponse>, ServerError> {
    let link = state
        .mutate(move |engine| async move { engine.remove_tag(id, tag_id).await })
        .await?;
    if link.changed() {
        tracing::info!(%id, %tag_id, "tag removed from transaction");
    }

    Ok(Json(TagLinkResponse {
        outcome: views::tag_link(link),
        changed: link.changed(),
    }))
}

pub async fn split(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SplitRequest>,
) -> Result<(StatusCode, Json<SplitResponse>), ServerError> {
    let parts = payload.parts;
    let (parent, children) = state
        .mutate(move |engine| async move {
            let outcome = engine.split_transaction(id, parts).await?;
            let parent = engine.transaction(id).await?;
            let mut children = Vec::with_capacity(outcome.children.len());
            for child in &outcome.children {
                children.push(engine.transaction(child.id).await?);
            }
            Ok((parent, children))
        })
        .await?;
    tracing::info!(%id, parts, "transaction split");

    Ok((
        StatusCode::CREATED,
        Json(SplitResponse {
            parent: views::transaction(parent, state.locale),
            children: children
                .into_iter()
                .map(|view| views::transaction(view, state.locale))
                .collect(),
        }),
    ))
}
