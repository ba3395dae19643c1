use api_types::balance::{BalanceResponse, InitialBalanceSet, InitialBalanceView};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState, views};

pub async fn initial_balance(
    State(state): State<ServerState>,
) -> Result<Json<InitialBalanceView>, ServerError> {
    let amount = state.engine.initial_balance().await?;
    Ok(Json(InitialBalanceView {
        amount: views::money(amount, state.locale),
    }))
}

pub async fn set_initial_balance(
    State(state): State<ServerState>,
    Json(payload): Json<InitialBalanceSet>,
) -> Result<Json<InitialBalanceView>, ServerError> {
    let input = views::amount_input(payload.amount);
    let amount = state
        .mutate(move |engine| async move { engine.set_initial_balance(input).await })
        .await?;
    tracing::info!(minor = amount.minor(), "initial balance set");

    Ok(Json(InitialBalanceView {
        amount: views::money(amount, state.locale),
    }))
}

pub async fn sheet(State(state): State<ServerState>) -> Result<Json<BalanceResponse>, ServerError> {
    let sheet = state.engine.balance_sheet().await?;
    Ok(Json(views::running_balance(sheet, state.locale)))
}
