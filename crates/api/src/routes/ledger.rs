use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::ledger;
use crate::state::AppState;

/// Ledger routes mounted at `/ledger`.
///
/// ```text
/// GET    /{account}        -> get_balance
/// POST   /withdraw         -> withdraw
/// PUT    /accepts-funds    -> set_accepts_funds
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/withdraw", post(ledger::withdraw))
        .route("/accepts-funds", put(ledger::set_accepts_funds))
        .route("/{account}", get(ledger::get_balance))
}
