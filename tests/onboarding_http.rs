//! Integration tests for the onboarding and agents REST surface.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory database and drives it over HTTP with reqwest.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;

use agent_hire::agents::{agent_routes, AgentRouteState};
use agent_hire::model::EntityStatus;
use agent_hire::onboarding::{onboarding_routes, OnboardingRouteState, OnboardingService};
use agent_hire::store::{repo, LibSqlStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start an Axum server on a random port with one active agent seeded.
/// Returns (base_url, agent_id).
async fn start_server() -> (String, String) {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let agent = repo::create_agent(
        store.conn(),
        "Support Bot",
        "You are a helpful support assistant.",
        EntityStatus::Active,
    )
    .await
    .unwrap();

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(onboarding_routes(OnboardingRouteState {
            service: Arc::new(OnboardingService::new(Arc::clone(&store))),
        }))
        .merge(agent_routes(AgentRouteState { store }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), agent.id)
}

fn channel_body(name: &str, phone: Option<&str>) -> Value {
    let mut config = json!({
        "accessToken": "tok",
        "webhookVerifyToken": "verify"
    });
    if let Some(phone) = phone {
        config["phoneNumberId"] = phone.into();
    }
    json!({
        "name": name,
        "type": "whatsapp",
        "provider": "meta",
        "agentChannelConfig": {
            "channelConfig": config,
            "llmConfig": {
                "provider": "openai",
                "apiKey": "sk-secret",
                "model": "gpt-4o-mini"
            }
        }
    })
}

fn register_body(email: &str, agent_id: &str, channels: Vec<Value>) -> Value {
    json!({
        "user": { "email": email, "name": "Alice" },
        "client": { "type": "individual" },
        "agentHiring": { "agentId": agent_id, "price": 100.0 },
        "channels": channels,
    })
}

async fn post_register(base: &str, body: &Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base}/onboarding/register-and-hire"))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn register_and_hire_creates_the_full_tenant() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, body) = post_register(
            &base,
            &register_body("A@B.com ", &agent_id, vec![channel_body("wa-main", Some("555"))]),
        )
        .await;

        assert_eq!(status, 201);
        assert_eq!(body["user"]["email"], "a@b.com");
        assert_eq!(body["user"]["name"], "Alice");
        assert_eq!(body["client"]["name"], "Alice");
        assert_eq!(body["client"]["ownerUserId"], body["user"]["id"]);
        assert_eq!(body["user"]["clientId"], body["client"]["id"]);
        assert_eq!(body["clientAgent"]["agentId"], json!(agent_id));
        assert_eq!(body["clientAgent"]["price"], 100.0);

        let bindings = body["agentChannels"].as_array().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0]["status"], "active");
        assert!(bindings[0]["clientPhoneId"].is_string());
        // Phone number lives in the ownership record, not the stored config.
        assert!(bindings[0]["channelConfig"].get("phoneNumberId").is_none());
        // The API key never crosses the boundary.
        let llm = &bindings[0]["llmConfig"];
        assert_eq!(llm["provider"], "openai");
        assert_eq!(llm["model"], "gpt-4o-mini");
        assert!(llm.get("apiKey").is_none());
        assert!(!body.to_string().contains("sk-secret"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, _) =
            post_register(&base, &register_body("a@b.com", &agent_id, vec![])).await;
        assert_eq!(status, 201);

        // Same address modulo case and whitespace.
        let (status, body) =
            post_register(&base, &register_body(" A@B.COM", &agent_id, vec![])).await;
        assert_eq!(status, 409);
        assert_eq!(body["error"], "User with this email already exists");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn organization_without_name_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let body = json!({
            "user": { "email": "a@b.com", "name": "Alice" },
            "client": { "type": "organization" },
            "agentHiring": { "agentId": agent_id, "price": 100.0 },
            "channels": [],
        });
        let (status, body) = post_register(&base, &body).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Client name is required for organization type");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_and_archived_agents_are_bad_requests() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, body) =
            post_register(&base, &register_body("a@b.com", "nope", vec![])).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Agent not found");

        let response = reqwest::Client::new()
            .post(format!("{base}/api/agents/{agent_id}/status"))
            .json(&json!({"status": "archived"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let (status, body) =
            post_register(&base, &register_body("a@b.com", &agent_id, vec![])).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Agent is not currently available");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn duplicate_channel_names_are_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, body) = post_register(
            &base,
            &register_body(
                "a@b.com",
                &agent_id,
                vec![channel_body("wa", None), channel_body("wa", None)],
            ),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Duplicate channel names in request");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn phone_owned_by_another_client_is_a_conflict() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, _) = post_register(
            &base,
            &register_body("first@b.com", &agent_id, vec![channel_body("wa-1", Some("555"))]),
        )
        .await;
        assert_eq!(status, 201);

        let (status, body) = post_register(
            &base,
            &register_body("second@b.com", &agent_id, vec![channel_body("wa-2", Some("555"))]),
        )
        .await;
        assert_eq!(status, 409);
        assert_eq!(
            body["error"],
            "Phone number 555 is already owned by another client"
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn shared_phone_within_one_request_reuses_the_record() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, body) = post_register(
            &base,
            &register_body(
                "a@b.com",
                &agent_id,
                vec![
                    channel_body("wa-sales", Some("555")),
                    channel_body("wa-support", Some("555")),
                ],
            ),
        )
        .await;
        assert_eq!(status, 201);

        let bindings = body["agentChannels"].as_array().unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0]["clientPhoneId"], bindings[1]["clientPhoneId"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn channel_catalog_is_shared_across_tenants() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (_, first) = post_register(
            &base,
            &register_body("one@b.com", &agent_id, vec![channel_body("wa", None)]),
        )
        .await;
        let (_, second) = post_register(
            &base,
            &register_body("two@b.com", &agent_id, vec![channel_body("wa", None)]),
        )
        .await;

        assert_eq!(
            first["agentChannels"][0]["channelId"],
            second["agentChannels"][0]["channelId"]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_email_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, agent_id) = start_server().await;

        let (status, body) =
            post_register(&base, &register_body("not-an-email", &agent_id, vec![])).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("email"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_json_gets_the_same_error_shape() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/onboarding/register-and-hire"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agents_admin_surface_publishes_and_lists() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);

        let response = client
            .post(format!("{base}/api/agents"))
            .json(&json!({
                "name": "Sales Bot",
                "systemPrompt": "You close deals."
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let created: Value = response.json().await.unwrap();
        assert_eq!(created["status"], "active");
        let new_id = created["id"].as_str().unwrap().to_string();

        let listed: Value = client
            .get(format!("{base}/api/agents"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let fetched: Value = client
            .get(format!("{base}/api/agents/{new_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["name"], "Sales Bot");

        // The fresh agent is immediately hireable.
        let (status, _) =
            post_register(&base, &register_body("hire@b.com", &new_id, vec![])).await;
        assert_eq!(status, 201);
    })
    .await
    .expect("test timed out");
}
