use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rwa_core::types::{Amount, Identity};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct AcceptsFundsRequest {
    pub accepts: bool,
}

#[derive(Debug, Serialize)]
pub struct Balance {
    pub account: Identity,
    pub balance: Amount,
    pub accepts_funds: bool,
}

fn balance(state: &AppState, account: Identity) -> AppResult<Balance> {
    state.read(|market| {
        Ok(Balance {
            balance: market.balance_of(&account),
            accepts_funds: market.ledger().accepts_funds(&account),
            account,
        })
    })
}

/// GET /api/v1/ledger/{account}
pub async fn get_balance(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(account): Path<Identity>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: balance(&state, account)?,
    }))
}

/// POST /api/v1/ledger/withdraw
///
/// Debit the caller's credited balance.
pub async fn withdraw(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<WithdrawRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.withdraw(&user.identity, input.amount)
    })?;
    Ok(Json(DataResponse {
        data: balance(&state, user.identity)?,
    }))
}

/// PUT /api/v1/ledger/accepts-funds
pub async fn set_accepts_funds(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AcceptsFundsRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .lock_market()?
        .set_accepts_funds(&user.identity, input.accepts);
    Ok(StatusCode::NO_CONTENT)
}
