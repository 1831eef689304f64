//! Handlers for the exchange.
//!
//! Listing, delisting and purchasing assets, plus the owner-only fee and
//! registry settings.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rwa_core::market::Committed;
use rwa_core::types::{Amount, AssetId, Identity};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub asset_id: AssetId,
    pub price: Amount,
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub payment: Amount,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub payment: Amount,
}

#[derive(Debug, Deserialize)]
pub struct FeeRequest {
    pub fee_bps: u16,
}

#[derive(Debug, Deserialize)]
pub struct FeeCollectorRequest {
    pub collector: Identity,
}

#[derive(Debug, Deserialize)]
pub struct RegistryRequest {
    pub registry: Identity,
}

#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    pub owner: Identity,
}

#[derive(Debug, Serialize)]
pub struct ExchangeInfo {
    pub address: Identity,
    pub registry: Identity,
    pub fee_bps: u16,
    pub fee_collector: Identity,
    pub active_listings: usize,
}

/// GET /api/v1/exchange
pub async fn get_exchange(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let info = state.read(|market| {
        let exchange = market.exchange();
        Ok(ExchangeInfo {
            address: exchange.address().clone(),
            registry: exchange.registry().clone(),
            fee_bps: exchange.fee_basis_points(),
            fee_collector: exchange.fee_collector().clone(),
            active_listings: exchange.active_listing_count(),
        })
    })?;
    Ok(Json(DataResponse { data: info }))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// GET /api/v1/exchange/listings
pub async fn list_active(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let listings = state.read(|market| Ok(market.active_listings()))?;
    Ok(Json(DataResponse { data: listings }))
}

/// POST /api/v1/exchange/listings
///
/// Offer an asset for sale. The caller must own it and have approved the
/// exchange.
pub async fn create_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateListingRequest>,
) -> AppResult<impl IntoResponse> {
    let listing = state.commit(&user.identity, |market| {
        let listed = market.list(&user.identity, input.asset_id, input.price)?;
        Ok(Committed {
            value: market.listing(input.asset_id)?.clone(),
            events: listed.events,
        })
    })?;

    tracing::info!(
        asset_id = listing.asset_id,
        price = listing.price,
        seller = %listing.seller,
        "Asset listed",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: listing })))
}

/// GET /api/v1/exchange/listings/{id}
pub async fn get_listing(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> AppResult<impl IntoResponse> {
    let listing = state.read(|market| market.listing(id).cloned())?;
    Ok(Json(DataResponse { data: listing }))
}

/// DELETE /api/v1/exchange/listings/{id}
pub async fn delist(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| market.delist(&user.identity, id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/exchange/listings/{id}/buy
///
/// Settle a purchase. Any overpayment is credited back to the buyer.
pub async fn buy(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Json(input): Json<BuyRequest>,
) -> AppResult<impl IntoResponse> {
    let receipt = state.commit(&user.identity, |market| {
        market.buy(&user.identity, id, input.payment)
    })?;

    tracing::info!(
        asset_id = id,
        buyer = %receipt.buyer,
        seller = %receipt.seller,
        price = receipt.quote.price,
        fee = receipt.quote.fee,
        "Asset sold",
    );

    Ok(Json(DataResponse { data: receipt }))
}

/// GET /api/v1/exchange/listings/{id}/quote?payment=
pub async fn quote(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(params): Query<QuoteParams>,
) -> AppResult<impl IntoResponse> {
    let quote = state.read(|market| market.quote(id, params.payment))?;
    Ok(Json(DataResponse { data: quote }))
}

// ---------------------------------------------------------------------------
// Settings (owner only)
// ---------------------------------------------------------------------------

/// PUT /api/v1/exchange/fee
pub async fn update_fee(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<FeeRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.update_fee(&user.identity, input.fee_bps)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/exchange/fee-collector
pub async fn update_fee_collector(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<FeeCollectorRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.update_fee_collector(&user.identity, input.collector)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/exchange/registry
pub async fn update_registry(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<RegistryRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.update_exchange_registry(&user.identity, input.registry)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/exchange/owner
pub async fn transfer_ownership(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<OwnerRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        market.transfer_exchange_ownership(&user.identity, input.owner)
    })?;
    Ok(StatusCode::NO_CONTENT)
}
