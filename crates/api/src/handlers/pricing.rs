//! Handlers for the pricing agent.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rwa_core::access::Role;
use rwa_core::pricing::PriceSubmission;
use rwa_core::types::{Amount, AssetId, Identity};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitPriceRequest {
    pub new_price: Amount,
    pub source: String,
    /// Accepted as a wide integer so out-of-range scores reach validation.
    pub confidence_score: u32,
}

#[derive(Debug, Deserialize)]
pub struct RegistryRequest {
    pub registry: Identity,
}

#[derive(Debug, Deserialize)]
pub struct MinConfidenceRequest {
    pub confidence_score: u32,
}

#[derive(Debug, Serialize)]
pub struct PricingInfo {
    pub address: Identity,
    pub registry: Identity,
    pub minimum_confidence: u8,
}

/// GET /api/v1/pricing
pub async fn get_pricing(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let info = state.read(|market| {
        let pricing = market.pricing();
        Ok(PricingInfo {
            address: pricing.address().clone(),
            registry: pricing.registry().clone(),
            minimum_confidence: pricing.minimum_confidence(),
        })
    })?;
    Ok(Json(DataResponse { data: info }))
}

/// POST /api/v1/pricing/assets/{id}/updates
///
/// Submit a new valuation. Submitter role only.
pub async fn submit_price(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Json(input): Json<SubmitPriceRequest>,
) -> AppResult<impl IntoResponse> {
    let entry = state.commit(&user.identity, |market| {
        market.submit_price(
            &user.identity,
            PriceSubmission {
                asset_id: id,
                new_price: input.new_price,
                source: input.source,
                confidence_score: input.confidence_score,
            },
        )
    })?;

    tracing::info!(
        asset_id = id,
        old_price = entry.old_price,
        new_price = entry.new_price,
        submitter = %user.identity,
        "Price updated",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// GET /api/v1/pricing/assets/{id}/latest
pub async fn get_latest(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> AppResult<impl IntoResponse> {
    let entry = state.read(|market| market.latest_price_update(id).cloned())?;
    Ok(Json(DataResponse { data: entry }))
}

/// GET /api/v1/pricing/assets/{id}/history?offset=&limit=
///
/// Oldest retained entry first. Unknown assets yield an empty page.
pub async fn get_history(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let entries =
        state.read(|market| Ok(market.price_history(id, params.offset(), params.limit())))?;
    Ok(Json(DataResponse { data: entries }))
}

/// PUT /api/v1/pricing/registry
pub async fn set_registry(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<RegistryRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.set_pricing_registry(&user.identity, input.registry)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/pricing/min-confidence
pub async fn set_min_confidence(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<MinConfidenceRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.set_minimum_confidence(&user.identity, input.confidence_score)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/pricing/roles/{role}/{account}
pub async fn grant_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path((role, account)): Path<(Role, Identity)>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.grant_pricing_role(&user.identity, role, account)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/pricing/roles/{role}/{account}
pub async fn revoke_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path((role, account)): Path<(Role, Identity)>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.revoke_pricing_role(&user.identity, role, &account)
    })?;
    Ok(StatusCode::NO_CONTENT)
}
