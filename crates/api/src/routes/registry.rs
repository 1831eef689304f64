//! Route definitions for the asset registry.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::registry;
use crate::state::AppState;

/// Asset routes mounted at `/assets`. Each accepts `?registry=` to address a
/// registry other than the primary.
///
/// ```text
/// POST   /                 -> create_asset (controller only)
/// GET    /{id}             -> get_asset
/// GET    /{id}/price       -> get_asset_price
/// POST   /{id}/approve     -> approve
/// POST   /{id}/transfer    -> transfer_asset
/// ```
pub fn asset_router() -> Router<AppState> {
    Router::new()
        .route("/", post(registry::create_asset))
        .route("/{id}", get(registry::get_asset))
        .route("/{id}/price", get(registry::get_asset_price))
        .route("/{id}/approve", post(registry::approve))
        .route("/{id}/transfer", post(registry::transfer_asset))
}

/// Registry administration routes mounted at `/registry`. All but
/// `/deployments` accept `?registry=`.
///
/// ```text
/// GET    /                       -> get_registry
/// POST   /deployments            -> deploy_registry
/// PUT    /price-authority        -> set_price_authority (controller only)
/// PUT    /controller             -> transfer_control (controller only)
/// PUT    /operators/{operator}   -> set_operator
/// GET    /owners/{owner}         -> get_owner_balance
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(registry::get_registry))
        .route("/deployments", post(registry::deploy_registry))
        .route("/price-authority", put(registry::set_price_authority))
        .route("/controller", put(registry::transfer_control))
        .route("/operators/{operator}", put(registry::set_operator))
        .route("/owners/{owner}", get(registry::get_owner_balance))
}
