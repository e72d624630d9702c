//! API integration tests against a running server

use std::time::Duration;

use device_tracker::models::UserClaims;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Mint a token the way the external auth service would
fn auth_token(role: Option<&str>) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let claims = UserClaims {
        sub: Uuid::new_v4(),
        email: "owner@example.com".to_string(),
        role: role.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    claims.create_token(&secret).expect("Failed to sign token")
}

fn random_imei() -> String {
    let digits: u64 = rand::random::<u64>() % 1_000_000_000_000_000;
    format!("{:015}", digits)
}

async fn create_device(client: &Client, token: &str, name: &str) -> Value {
    let response = client
        .post(format!("{}/devices", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "device_name": name,
            "imei_number": random_imei(),
            "brand": "Acme",
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
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
async fn test_register_device() {
    let client = Client::new();
    let token = auth_token(None);

    let device = create_device(&client, &token, "Phone A").await;
    assert_eq!(device["status"], "active");
    assert_eq!(device["admin_status"], "pending");
    assert_eq!(device["tracking_requested"], false);
}

#[tokio::test]
#[ignore]
async fn test_live_tracking_publishes_fix() {
    let client = Client::new();
    let token = auth_token(None);
    let device = create_device(&client, &token, "Phone A").await;
    let device_id = device["id"].as_str().unwrap();

    let response = client
        .post(format!("{}/tracking/sessions", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "device_id": device_id, "wake_lock_supported": true }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let session: Value = response.json().await.unwrap();
    assert_eq!(session["state"], "tracking");
    assert_eq!(session["wake_lock_held"], true);
    let session_id = session["session_id"].as_str().unwrap();

    let response = client
        .post(format!("{}/tracking/sessions/{}/positions", BASE_URL, session_id))
        .bearer_auth(&token)
        .json(&json!({ "latitude": -22.5609, "longitude": 17.0658, "accuracy": 12.3 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 202);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let device: Value = client
        .get(format!("{}/devices/{}", BASE_URL, device_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(device["incident_latitude"], -22.5609);
    assert_eq!(device["incident_longitude"], 17.0658);
    assert_eq!(
        device["incident_location"],
        "Live Tracker: -22.56090, 17.06580 (Accuracy: 12m)"
    );

    let session: Value = client
        .get(format!("{}/tracking/sessions/{}", BASE_URL, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        session["activity_log"][0]["message"],
        "Location sent: -22.560900, 17.065800 (±12m)"
    );

    // stop twice
    for _ in 0..2 {
        let response = client
            .delete(format!("{}/tracking/sessions/{}", BASE_URL, session_id))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let session: Value = response.json().await.unwrap();
        assert_eq!(session["state"], "idle");
        assert_eq!(session["activity_log"][0]["message"], "Tracking stopped");
    }
}

#[tokio::test]
#[ignore]
async fn test_start_tracking_requires_device() {
    let client = Client::new();
    let token = auth_token(None);

    let response = client
        .post(format!("{}/tracking/sessions", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "wake_lock_supported": false }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_simulation_lifecycle() {
    let client = Client::new();
    let token = auth_token(None);
    let device = create_device(&client, &token, "Phone B").await;
    let device_id = device["id"].as_str().unwrap();

    let status: Value = client
        .post(format!("{}/simulation", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "device_id": device_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);
    assert_eq!(status["current_position"]["latitude"], -22.5609);

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let device: Value = client
        .get(format!("{}/devices/{}", BASE_URL, device_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(device["incident_location"]
        .as_str()
        .unwrap()
        .starts_with("Simulated Location ("));

    let status: Value = client
        .delete(format!("{}/simulation", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], false);
}

#[tokio::test]
#[ignore]
async fn test_report_incident_validation() {
    let client = Client::new();
    let token = auth_token(None);
    let device = create_device(&client, &token, "Phone C").await;
    let device_id = device["id"].as_str().unwrap();

    let response = client
        .post(format!("{}/devices/{}/report", BASE_URL, device_id))
        .bearer_auth(&token)
        .json(&json!({
            "status": "found",
            "incident_location": "Windhoek",
            "incident_date": "2024-05-01T10:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{}/devices/{}/report", BASE_URL, device_id))
        .bearer_auth(&token)
        .json(&json!({
            "status": "stolen",
            "incident_location": "Windhoek",
            "incident_date": "2024-05-01T10:00:00Z",
            "incident_latitude": -22.5609,
            "incident_longitude": 17.0658,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let device: Value = response.json().await.unwrap();
    assert_eq!(device["status"], "stolen");
    assert_eq!(device["tracking_requested"], true);
}

#[tokio::test]
#[ignore]
async fn test_map_frame_for_owner() {
    let client = Client::new();
    let token = auth_token(None);
    create_device(&client, &token, "Phone D").await;

    let frame: Value = client
        .get(format!("{}/tracking/map", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // new device has no coordinates yet
    assert_eq!(frame["markers"].as_array().unwrap().len(), 0);
    assert_eq!(frame["zoom"], 6);
}

#[tokio::test]
#[ignore]
async fn test_location_write_on_device_with_long_description() {
    let client = Client::new();
    let token = auth_token(None);
    let device = create_device(&client, &token, "Phone E").await;
    let device_id = device["id"].as_str().unwrap();

    let description = "Cracked screen, blue case, sticker on the back. ".repeat(110);
    let response = client
        .post(format!("{}/devices/{}/report", BASE_URL, device_id))
        .bearer_auth(&token)
        .json(&json!({
            "status": "lost",
            "incident_location": "Windhoek",
            "incident_date": "2024-05-01T10:00:00Z",
            "description": description,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let status: Value = client
        .post(format!("{}/simulation", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "device_id": device_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let status: Value = client
        .get(format!("{}/simulation", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);
    assert!(status["last_error"].is_null());

    let device: Value = client
        .get(format!("{}/devices/{}", BASE_URL, device_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(device["incident_location"]
        .as_str()
        .unwrap()
        .starts_with("Simulated Location ("));
    assert_eq!(device["description"].as_str().unwrap().len(), description.len());

    client
        .delete(format!("{}/simulation", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
}
