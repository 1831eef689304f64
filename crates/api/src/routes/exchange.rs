//! Route definitions for the exchange.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::exchange;
use crate::state::AppState;

/// Exchange routes mounted at `/exchange`.
///
/// ```text
/// GET    /                      -> get_exchange
/// GET    /listings              -> list_active
/// POST   /listings              -> create_listing
/// GET    /listings/{id}         -> get_listing
/// DELETE /listings/{id}         -> delist
/// POST   /listings/{id}/buy     -> buy
/// GET    /listings/{id}/quote   -> quote
/// PUT    /fee                   -> update_fee (owner only)
/// PUT    /fee-collector         -> update_fee_collector (owner only)
/// PUT    /registry              -> update_registry (owner only)
/// PUT    /owner                 -> transfer_ownership (owner only)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(exchange::get_exchange))
        .route(
            "/listings",
            get(exchange::list_active).post(exchange::create_listing),
        )
        .route(
            "/listings/{id}",
            get(exchange::get_listing).delete(exchange::delist),
        )
        .route("/listings/{id}/buy", post(exchange::buy))
        .route("/listings/{id}/quote", get(exchange::quote))
        .route("/fee", put(exchange::update_fee))
        .route("/fee-collector", put(exchange::update_fee_collector))
        .route("/registry", put(exchange::update_registry))
        .route("/owner", put(exchange::transfer_ownership))
}
