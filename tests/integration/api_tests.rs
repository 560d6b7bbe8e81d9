//! API integration tests
//!
//! These talk to a running server backed by a migrated database.
//! Run with: cargo test -- --ignored

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

use opsdesk_server::models::{enums::Role, user::UserClaims};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const JWT_SECRET: &str = "change-this-secret-in-production";

/// Mint a token the server accepts with the default configuration
fn token_for(user_id: i32, role: Role) -> String {
    let now = Utc::now().timestamp();
    let claims = UserClaims {
        sub: format!("user{}", user_id),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    };
    claims.create_token(JWT_SECRET).expect("Failed to sign token")
}

fn unique_tag(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn create_asset(client: &Client, token: &str) -> Value {
    let response = client
        .post(format!("{}/assets", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "asset_tag": unique_tag("LT"),
            "asset_type": "laptop",
            "model": "ThinkPad T14"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

async fn set_status(client: &Client, token: &str, id: i64, status: &str) -> reqwest::Response {
    client
        .put(format!("{}/assets/{}", BASE_URL, id))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_requires_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/assets", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_employee_cannot_create_asset() {
    let client = Client::new();
    let token = token_for(500, Role::Employee);

    let response = client
        .post(format!("{}/assets", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "asset_tag": unique_tag("PH"), "asset_type": "phone" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_asset_lifecycle() {
    let client = Client::new();
    let token = token_for(1, Role::It);

    let asset = create_asset(&client, &token).await;
    let id = asset["id"].as_i64().expect("No asset ID");
    assert_eq!(asset["status"], "In-Stock");

    // Stock items can be assigned directly
    let response = client
        .get(format!("{}/assets/{}/transitions", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["allowed_transitions"], json!(["Available", "Maintenance", "Decommissioning"]));
    assert_eq!(body["actions"]["assign"], true);
    assert_eq!(body["actions"]["return"], false);

    let response = client
        .post(format!("{}/assets/assignments", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "asset_id": id, "employee_id": 77 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    // A second open assignment is refused
    let response = client
        .post(format!("{}/assets/assignments", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "asset_id": id, "employee_id": 78 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_client_error());

    let response = client
        .get(format!("{}/assets/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "Assigned");
    assert_eq!(body["current_assignment"]["employee_id"], 77);
    assert_eq!(body["actions"]["return"], true);

    let response = client
        .post(format!("{}/assets/{}/return", BASE_URL, id))
        .bearer_auth(&token)
        .json(&json!({ "notes": "Screen scratched" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["returned_at"].is_string());

    // Available cannot jump to Retired
    let response = set_status(&client, &token, id, "Retired").await;
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["message"],
        "Cannot transition from Available to Retired. Allowed transitions: Assigned, Maintenance, Decommissioning"
    );

    let response = set_status(&client, &token, id, "Decommissioning").await;
    assert_eq!(response.status(), 200);
    let response = set_status(&client, &token, id, "Retired").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["allowed_transitions"], json!([]));

    let response = client
        .get(format!("{}/assets/{}/assignments", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));
}

#[tokio::test]
#[ignore]
async fn test_return_without_assignment_rejected() {
    let client = Client::new();
    let token = token_for(1, Role::It);

    let asset = create_asset(&client, &token).await;
    let id = asset["id"].as_i64().expect("No asset ID");

    let response = client
        .post(format!("{}/assets/{}/return", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 422);
}

#[tokio::test]
#[ignore]
async fn test_ticket_flow() {
    let client = Client::new();
    let employee = token_for(321, Role::Employee);
    let staff = token_for(1, Role::It);

    let response = client
        .get(format!("{}/tickets/priorities", BASE_URL))
        .bearer_auth(&employee)
        .send()
        .await
        .expect("Failed to send request");
    let priorities: Value = response.json().await.expect("Failed to parse response");
    let priority_id = priorities
        .as_array()
        .and_then(|p| p.iter().find(|p| p["name"] == "Medium"))
        .and_then(|p| p["id"].as_i64())
        .expect("Medium priority missing");

    let response = client
        .post(format!("{}/tickets", BASE_URL))
        .bearer_auth(&employee)
        .json(&json!({ "title": "VPN keeps disconnecting", "priority_id": priority_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let ticket: Value = response.json().await.expect("Failed to parse response");
    let id = ticket["id"].as_i64().expect("No ticket ID");
    assert_eq!(ticket["status"], "Open");
    assert_eq!(ticket["sla"]["sla_hours"], 24);
    assert_eq!(ticket["sla"]["is_overdue"], false);
    assert_eq!(ticket["is_pending_vendor"], false);

    // Another employee cannot see it
    let response = client
        .get(format!("{}/tickets/{}", BASE_URL, id))
        .bearer_auth(token_for(322, Role::Employee))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{}/tickets/{}/comments", BASE_URL, id))
        .bearer_auth(&staff)
        .json(&json!({ "body": "Which client version are you on?" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .put(format!("{}/tickets/{}", BASE_URL, id))
        .bearer_auth(&staff)
        .json(&json!({ "status": "Closed" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["resolved_at"].is_string());
    assert!(body["last_comment_at"].is_string());

    let response = client
        .post(format!("{}/tickets/{}/comments", BASE_URL, id))
        .bearer_auth(&employee)
        .json(&json!({ "body": "Still broken" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_assign_and_decommission() {
    let client = Client::new();
    let token = token_for(1, Role::It);

    let asset = create_asset(&client, &token).await;
    let id = asset["id"].as_i64().expect("No asset ID");
    let response = set_status(&client, &token, id, "Available").await;
    assert_eq!(response.status(), 200);

    let assign = client
        .post(format!("{}/assets/assignments", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "asset_id": id, "employee_id": 90 }))
        .send();
    let decommission = set_status(&client, &token, id, "Decommissioning");
    let (assign, decommission) = tokio::join!(assign, decommission);
    let assign = assign.expect("Failed to send request");

    let response = client
        .get(format!("{}/assets/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");

    // Whichever request lost must have been refused, never applied on top
    match body["status"].as_str() {
        Some("Assigned") => {
            assert_eq!(assign.status(), 201);
            assert_ne!(decommission.status(), 200);
            assert_eq!(body["current_assignment"]["employee_id"], 90);
        }
        Some("Decommissioning") => {
            assert_eq!(decommission.status(), 200);
            assert!(body["current_assignment"].is_null());
        }
        other => panic!("Unexpected status {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_ticket_for_unknown_asset_rejected() {
    let client = Client::new();
    let token = token_for(321, Role::Employee);

    let response = client
        .post(format!("{}/tickets", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "title": "Dock not charging", "priority_id": 1, "asset_id": 999_999_999 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "Asset 999999999 does not exist");
}
