pub mod events;
pub mod exchange;
pub mod health;
pub mod ledger;
pub mod pricing;
pub mod registry;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /assets                         asset records, approvals, transfers
/// /registry                       registry administration
/// /pricing                        price submissions and history
/// /exchange                       listings, purchases and exchange settings
/// /ledger                         credited balances and withdrawals
/// /events                         recent market notifications
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/assets", registry::asset_router())
        .nest("/registry", registry::router())
        .nest("/pricing", pricing::router())
        .nest("/exchange", exchange::router())
        .nest("/ledger", ledger::router())
        .nest("/events", events::router())
}
