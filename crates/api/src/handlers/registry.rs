//! Handlers for the asset registry.
//!
//! Asset creation, approvals, transfers and registry administration. Every
//! mutation is authorized against the bearer token's identity. All handlers
//! act on the primary registry unless `?registry=` names another one.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rwa_core::market::{Committed, NewAsset};
use rwa_core::registry::AssetMetadata;
use rwa_core::types::{Amount, AssetId, Identity};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::RegistryParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub owner: Identity,
    pub uri: String,
    pub initial_price: Amount,
    pub metadata: AssetMetadata,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// `null` clears the current approval.
    pub approved: Option<Identity>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: Identity,
    pub to: Identity,
}

#[derive(Debug, Deserialize)]
pub struct PriceAuthorityRequest {
    pub authority: Identity,
}

#[derive(Debug, Deserialize)]
pub struct ControllerRequest {
    pub controller: Identity,
}

#[derive(Debug, Deserialize)]
pub struct OperatorRequest {
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeployRegistryRequest {
    pub address: Identity,
}

#[derive(Debug, Serialize)]
pub struct AssetPrice {
    pub asset_id: AssetId,
    pub current_price: Amount,
    pub initial_price: Amount,
}

#[derive(Debug, Serialize)]
pub struct RegistryInfo {
    pub address: Identity,
    pub price_authority: Option<Identity>,
    pub total_supply: usize,
}

#[derive(Debug, Serialize)]
pub struct OwnerBalance {
    pub owner: Identity,
    pub asset_count: usize,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// POST /api/v1/assets
///
/// Mint a new asset. Registry controller only.
pub async fn create_asset(
    user: AuthUser,
    State(state): State<AppState>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<CreateAssetRequest>,
) -> AppResult<impl IntoResponse> {
    let record = state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        let created = market.create_asset_in(
            &registry,
            &user.identity,
            NewAsset {
                owner: input.owner,
                uri: input.uri,
                initial_price: input.initial_price,
                metadata: input.metadata,
            },
        )?;
        Ok(Committed {
            value: market.asset_in(&registry, created.value)?.clone(),
            events: created.events,
        })
    })?;

    tracing::info!(
        asset_id = record.id,
        owner = %record.owner,
        caller = %user.identity,
        "Asset created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// GET /api/v1/assets/{id}
pub async fn get_asset(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(target): Query<RegistryParams>,
) -> AppResult<impl IntoResponse> {
    let record = state.read(|market| {
        let registry = target.resolve(market);
        market.asset_in(&registry, id).cloned()
    })?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/assets/{id}/price
pub async fn get_asset_price(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(target): Query<RegistryParams>,
) -> AppResult<impl IntoResponse> {
    let price = state.read(|market| {
        let registry = market.registry_at(&target.resolve(market))?;
        Ok(AssetPrice {
            asset_id: id,
            current_price: registry.get_price(id)?,
            initial_price: registry.get_initial_price(id)?,
        })
    })?;
    Ok(Json(DataResponse { data: price }))
}

/// POST /api/v1/assets/{id}/approve
///
/// Set or clear the single approved delegate. Owner or operator only.
pub async fn approve(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<ApproveRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        market.approve_in(&registry, &user.identity, id, input.approved)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/assets/{id}/transfer
pub async fn transfer_asset(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<TransferRequest>,
) -> AppResult<impl IntoResponse> {
    let record = state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        let moved =
            market.transfer_asset_in(&registry, &user.identity, &input.from, input.to, id)?;
        Ok(Committed {
            value: market.asset_in(&registry, id)?.clone(),
            events: moved.events,
        })
    })?;
    Ok(Json(DataResponse { data: record }))
}

// ---------------------------------------------------------------------------
// Registry administration
// ---------------------------------------------------------------------------

/// GET /api/v1/registry
pub async fn get_registry(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(target): Query<RegistryParams>,
) -> AppResult<impl IntoResponse> {
    let info = state.read(|market| {
        let registry = market.registry_at(&target.resolve(market))?;
        Ok(RegistryInfo {
            address: registry.address().clone(),
            price_authority: registry.price_authority().cloned(),
            total_supply: registry.total_supply(),
        })
    })?;
    Ok(Json(DataResponse { data: info }))
}

/// POST /api/v1/registry/deployments
///
/// Stand up another registry with the caller as its controller.
pub async fn deploy_registry(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<DeployRegistryRequest>,
) -> AppResult<impl IntoResponse> {
    let mut market = state.lock_market()?;
    market.deploy_registry(input.address.clone(), user.identity.clone())?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: input.address,
        }),
    ))
}

/// PUT /api/v1/registry/price-authority
pub async fn set_price_authority(
    user: AuthUser,
    State(state): State<AppState>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<PriceAuthorityRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        market.set_price_authority_in(&registry, &user.identity, input.authority)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/registry/controller
pub async fn transfer_control(
    user: AuthUser,
    State(state): State<AppState>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<ControllerRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        market.transfer_registry_control_in(&registry, &user.identity, input.controller)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/registry/operators/{operator}
///
/// Grant or withdraw blanket operator rights over the caller's assets.
pub async fn set_operator(
    user: AuthUser,
    State(state): State<AppState>,
    Path(operator): Path<Identity>,
    Query(target): Query<RegistryParams>,
    Json(input): Json<OperatorRequest>,
) -> AppResult<impl IntoResponse> {
    state.commit(&user.identity, |market| {
        let registry = target.resolve(market);
        market.set_approval_for_all_in(&registry, &user.identity, operator, input.approved)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/registry/owners/{owner}
pub async fn get_owner_balance(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(owner): Path<Identity>,
    Query(target): Query<RegistryParams>,
) -> AppResult<impl IntoResponse> {
    let asset_count = state.read(|market| {
        Ok(market.registry_at(&target.resolve(market))?.balance_of(&owner))
    })?;
    Ok(Json(DataResponse {
        data: OwnerBalance { owner, asset_count },
    }))
}
