//! Route definitions for the pricing agent.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::pricing;
use crate::state::AppState;

/// Pricing routes mounted at `/pricing`.
///
/// ```text
/// GET    /                          -> get_pricing
/// POST   /assets/{id}/updates       -> submit_price (submitter only)
/// GET    /assets/{id}/latest        -> get_latest
/// GET    /assets/{id}/history       -> get_history
/// PUT    /registry                  -> set_registry (configurator only)
/// PUT    /min-confidence            -> set_min_confidence (configurator only)
/// PUT    /roles/{role}/{account}    -> grant_role (admin only)
/// DELETE /roles/{role}/{account}    -> revoke_role (admin only)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pricing::get_pricing))
        .route("/assets/{id}/updates", post(pricing::submit_price))
        .route("/assets/{id}/latest", get(pricing::get_latest))
        .route("/assets/{id}/history", get(pricing::get_history))
        .route("/registry", put(pricing::set_registry))
        .route("/min-confidence", put(pricing::set_min_confidence))
        .route(
            "/roles/{role}/{account}",
            put(pricing::grant_role).delete(pricing::revoke_role),
        )
}
