//! HTTP-level integration tests for the market endpoints.
//!
//! Requests are sent straight to the router with `tower::ServiceExt`; the
//! bearer token's subject is the caller identity.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, build_test_app, delete, get, post_json, put_json};
use serde_json::json;

const UNIT: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_asset(owner: &str, price: u64) -> serde_json::Value {
    json!({
        "owner": owner,
        "uri": "ipfs://warehouse-7",
        "initial_price": price,
        "metadata": {
            "name": "Warehouse 7",
            "asset_type": "real_estate",
            "location": "Rotterdam",
            "acquisition_timestamp": "2021-03-15T00:00:00Z",
            "description": "Logistics warehouse, 4000 m2",
            "verified": true
        }
    })
}

async fn mint(app: &Router, owner: &str, price: u64) -> u64 {
    let response = post_json(app, "/api/v1/assets", "controller", new_asset(owner, price)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_u64().unwrap()
}

/// Mint to alice, approve the exchange and list at `price`.
async fn listed(app: &Router, price: u64) -> u64 {
    let id = mint(app, "alice", 10 * UNIT).await;
    let response = post_json(
        app,
        &format!("/api/v1/assets/{id}/approve"),
        "alice",
        json!({ "approved": "exchange" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        app,
        "/api/v1/exchange/listings",
        "alice",
        json!({ "asset_id": id, "price": price }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    id
}

async fn balance(app: &Router, account: &str) -> u64 {
    let json = body_json(get(app, &format!("/api/v1/ledger/{account}"), account).await).await;
    json["data"]["balance"].as_u64().unwrap()
}

// ---------------------------------------------------------------------------
// Test: asset creation is controller only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_asset_as_controller() {
    let app = build_test_app();
    let response = post_json(&app, "/api/v1/assets", "controller", new_asset("alice", 5 * UNIT)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], 1);
    assert_eq!(json["data"]["owner"], "alice");
    assert_eq!(json["data"]["current_price"], 5 * UNIT);
    assert_eq!(json["data"]["metadata"]["name"], "Warehouse 7");

    let json = body_json(get(&app, "/api/v1/assets/1/price", "bob").await).await;
    assert_eq!(json["data"]["initial_price"], 5 * UNIT);
}

#[tokio::test]
async fn test_create_asset_by_stranger_is_forbidden() {
    let app = build_test_app();
    let response = post_json(&app, "/api/v1/assets", "mallory", new_asset("mallory", UNIT)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get(&app, "/api/v1/assets/1", "mallory").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: pricing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_price_records_history() {
    let app = build_test_app();
    let id = mint(&app, "alice", 10 * UNIT).await;

    let response = post_json(
        &app,
        &format!("/api/v1/pricing/assets/{id}/updates"),
        "appraiser",
        json!({ "new_price": 15 * UNIT, "source": "chainlink", "confidence_score": 85 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["old_price"], 10 * UNIT);
    assert_eq!(json["data"]["new_price"], 15 * UNIT);

    let json = body_json(get(&app, &format!("/api/v1/assets/{id}"), "bob").await).await;
    assert_eq!(json["data"]["current_price"], 15 * UNIT);

    let json = body_json(
        get(&app, &format!("/api/v1/pricing/assets/{id}/history"), "bob").await,
    )
    .await;
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source"], "chainlink");
    assert_eq!(entries[0]["confidence_score"], 85);
}

#[tokio::test]
async fn test_submit_price_rejections() {
    let app = build_test_app();
    let id = mint(&app, "alice", 10 * UNIT).await;
    let uri = format!("/api/v1/pricing/assets/{id}/updates");

    // Below the minimum confidence.
    let response = post_json(
        &app,
        &uri,
        "appraiser",
        json!({ "new_price": 15 * UNIT, "source": "chainlink", "confidence_score": 50 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Not a submitter.
    let response = post_json(
        &app,
        &uri,
        "alice",
        json!({ "new_price": 15 * UNIT, "source": "chainlink", "confidence_score": 90 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get(&app, &format!("/api/v1/pricing/assets/{id}/latest"), "alice").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grant_submitter_role() {
    let app = build_test_app();
    let id = mint(&app, "alice", 10 * UNIT).await;

    let response = put_json(&app, "/api/v1/pricing/roles/submitter/oracle", "controller", json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app,
        &format!("/api/v1/pricing/assets/{id}/updates"),
        "oracle",
        json!({ "new_price": 11 * UNIT, "source": "appraisal", "confidence_score": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = delete(&app, "/api/v1/pricing/roles/submitter/oracle", "controller").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app,
        &format!("/api/v1/pricing/assets/{id}/updates"),
        "oracle",
        json!({ "new_price": 12 * UNIT, "source": "appraisal", "confidence_score": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: deployed registries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mint_and_trade_on_deployed_registry() {
    let app = build_test_app();
    let primary_id = mint(&app, "alice", 10 * UNIT).await;

    let response = post_json(
        &app,
        "/api/v1/registry/deployments",
        "controller",
        json!({ "address": "registry-2" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = put_json(
        &app,
        "/api/v1/registry/price-authority?registry=registry-2",
        "controller",
        json!({ "authority": "pricing-agent" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app,
        "/api/v1/assets?registry=registry-2",
        "controller",
        new_asset("carol", 2 * UNIT),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["data"]["id"].as_u64().unwrap();
    assert_eq!(id, primary_id);

    let json = body_json(get(&app, "/api/v1/registry?registry=registry-2", "bob").await).await;
    assert_eq!(json["data"]["total_supply"], 1);
    assert_eq!(json["data"]["price_authority"], "pricing-agent");
    let json = body_json(get(&app, &format!("/api/v1/assets/{id}"), "bob").await).await;
    assert_eq!(json["data"]["owner"], "alice");

    for component in ["pricing", "exchange"] {
        let response = put_json(
            &app,
            &format!("/api/v1/{component}/registry"),
            "controller",
            json!({ "registry": "registry-2" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = post_json(
        &app,
        &format!("/api/v1/pricing/assets/{id}/updates"),
        "appraiser",
        json!({ "new_price": 3 * UNIT, "source": "appraisal", "confidence_score": 90 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(
        &app,
        &format!("/api/v1/assets/{id}/approve?registry=registry-2"),
        "carol",
        json!({ "approved": "exchange" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = post_json(
        &app,
        "/api/v1/exchange/listings",
        "carol",
        json!({ "asset_id": id, "price": 4 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 4 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(
        get(&app, &format!("/api/v1/assets/{id}?registry=registry-2"), "bob").await,
    )
    .await;
    assert_eq!(json["data"]["owner"], "bob");
    assert_eq!(json["data"]["current_price"], 3 * UNIT);
    let json = body_json(get(&app, &format!("/api/v1/assets/{id}"), "bob").await).await;
    assert_eq!(json["data"]["owner"], "alice");
    assert_eq!(json["data"]["current_price"], 10 * UNIT);
    assert_eq!(balance(&app, "carol").await, 3_900_000);
}

#[tokio::test]
async fn test_unknown_registry_is_not_found() {
    let app = build_test_app();
    let response = post_json(
        &app,
        "/api/v1/assets?registry=nowhere",
        "controller",
        new_asset("alice", UNIT),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: listing and buying
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_buy_settles_and_refunds() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;

    let json = body_json(
        get(
            &app,
            &format!("/api/v1/exchange/listings/{id}/quote?payment={}", 12 * UNIT),
            "bob",
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["fee"], 250_000);
    assert_eq!(json["data"]["refund"], 2 * UNIT);

    let response = post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 12 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["buyer"], "bob");
    assert_eq!(json["data"]["quote"]["seller_proceeds"], 9_750_000);

    assert_eq!(balance(&app, "alice").await, 9_750_000);
    assert_eq!(balance(&app, "collector").await, 250_000);
    assert_eq!(balance(&app, "bob").await, 2 * UNIT);

    let json = body_json(get(&app, &format!("/api/v1/assets/{id}"), "bob").await).await;
    assert_eq!(json["data"]["owner"], "bob");

    let json = body_json(get(&app, "/api/v1/exchange/listings", "bob").await).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    // A second purchase finds the listing inactive.
    let response = post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "carol",
        json!({ "payment": 12 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_buy_with_insufficient_payment() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;

    let response = post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 9 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(get(&app, &format!("/api/v1/exchange/listings/{id}"), "bob").await).await;
    assert_eq!(json["data"]["active"], true);
}

#[tokio::test]
async fn test_refused_proceeds_roll_back_sale() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;

    let response = put_json(
        &app,
        "/api/v1/ledger/accepts-funds",
        "alice",
        json!({ "accepts": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 10 * UNIT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TRANSFER_FAILED");
    assert_eq!(json["leg"], "seller_proceeds");

    let json = body_json(get(&app, &format!("/api/v1/assets/{id}"), "bob").await).await;
    assert_eq!(json["data"]["owner"], "alice");
    let json = body_json(get(&app, &format!("/api/v1/exchange/listings/{id}"), "bob").await).await;
    assert_eq!(json["data"]["active"], true);
    assert_eq!(balance(&app, "collector").await, 0);
}

#[tokio::test]
async fn test_delist_by_seller() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;

    let response = delete(&app, &format!("/api/v1/exchange/listings/{id}"), "bob").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete(&app, &format!("/api/v1/exchange/listings/{id}"), "alice").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get(&app, "/api/v1/exchange", "alice").await).await;
    assert_eq!(json["data"]["active_listings"], 0);
}

#[tokio::test]
async fn test_fee_update_is_owner_only_and_capped() {
    let app = build_test_app();

    let response = put_json(&app, "/api/v1/exchange/fee", "alice", json!({ "fee_bps": 100 })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json(&app, "/api/v1/exchange/fee", "controller", json!({ "fee_bps": 1001 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = put_json(&app, "/api/v1/exchange/fee", "controller", json!({ "fee_bps": 1000 })).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get(&app, "/api/v1/exchange", "alice").await).await;
    assert_eq!(json["data"]["fee_bps"], 1000);
}

// ---------------------------------------------------------------------------
// Test: ledger withdrawals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_withdraw_debits_balance() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;
    post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 10 * UNIT }),
    )
    .await;

    let response = post_json(&app, "/api/v1/ledger/withdraw", "alice", json!({ "amount": 750_000 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["balance"], 9 * UNIT);

    let response = post_json(&app, "/api/v1/ledger/withdraw", "alice", json!({ "amount": 10 * UNIT })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: committed events reach the journal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_journal_records_sale() {
    let app = build_test_app();
    let id = listed(&app, 10 * UNIT).await;
    post_json(
        &app,
        &format!("/api/v1/exchange/listings/{id}/buy"),
        "bob",
        json!({ "payment": 10 * UNIT }),
    )
    .await;

    // The recorder runs on its own task; give it a chance to drain.
    let mut types = Vec::new();
    for _ in 0..50 {
        let json = body_json(get(&app, "/api/v1/events?after=0", "bob").await).await;
        types = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["event_type"].as_str().unwrap().to_string())
            .collect();
        if types.iter().any(|t| t == "exchange.sold") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(types.iter().any(|t| t == "registry.asset_created"));
    assert!(types.iter().any(|t| t == "exchange.listed"));
    assert_eq!(types.last().map(String::as_str), Some("exchange.sold"));
}
