#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use recipe_share_api::config::{AppConfig, Environment};
use recipe_share_api::database::models::Ingredient;
use recipe_share_api::integrations::{ContentCheckError, ContentChecker, ContentVerdict};
use recipe_share_api::{app, AppState};

/// Rejects anything whose name mentions "rock"
pub struct PickyChecker;

#[async_trait]
impl ContentChecker for PickyChecker {
    async fn review(
        &self,
        name: &str,
        _ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        if name.to_lowercase().contains("rock") {
            Ok(ContentVerdict::Rejected("Rocks are not edible.".to_string()))
        } else {
            Ok(ContentVerdict::Approved)
        }
    }
}

/// Reviewer that never answers successfully
pub struct BrokenChecker;

#[async_trait]
impl ContentChecker for BrokenChecker {
    async fn review(
        &self,
        _name: &str,
        _ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        Err(ContentCheckError::Status {
            status: 503,
            body: "upstream unavailable".to_string(),
        })
    }
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fresh client with its own cookie jar, i.e. its own browser session
    pub fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("failed to build client")
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// Spawns an in-memory server with the default reviewer
pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(Arc::new(PickyChecker)).await
}

/// Spawns an in-memory server on a free port. It lives as long as the test's runtime.
pub async fn spawn_server_with(checker: Arc<dyn ContentChecker>) -> Result<TestServer> {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.security.bcrypt_cost = 4;
    config.api.enable_request_logging = false;

    let router = app(AppState::in_memory(config, checker));

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    let server = TestServer {
        port,
        base_url: format!("http://127.0.0.1:{}", port),
    };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}

/// Registers `username` and logs the returned client in
pub async fn logged_in_client(server: &TestServer, username: &str) -> Result<Client> {
    let client = server.client();

    let res = client
        .post(server.url("/register"))
        .json(&json!({
            "name": username,
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter22"
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "register {} failed: {}", username, res.status());

    let res = client
        .post(server.url("/login"))
        .json(&json!({ "username": username, "password": "hunter22" }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login {} failed: {}", username, res.status());

    Ok(client)
}

pub fn recipe_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Weeknight dinner",
        "ingredients": [
            { "name": "spaghetti", "quantity": 200, "unit": "g" },
            { "name": "garlic", "quantity": 3, "unit": "clove", "notes": "sliced" }
        ],
        "instructions": ["Boil the pasta", "Fry the garlic", "Combine"],
        "difficulty": 2,
        "time": "20 minutes"
    })
}

/// Creates a recipe and returns its id
pub async fn create_recipe(server: &TestServer, client: &Client, name: &str) -> Result<String> {
    let res = client
        .post(server.url("/recipe"))
        .json(&recipe_body(name))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create {} failed: {}", name, res.status());

    let body: Value = res.json().await?;
    body["data"]["recipe"]["id"]
        .as_str()
        .map(str::to_string)
        .context("created recipe has no id")
}

/// Asserts the error envelope and returns it
pub async fn expect_error(res: reqwest::Response, status: StatusCode, code: &str) -> Result<Value> {
    assert_eq!(res.status(), status, "unexpected status");
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false, "expected error envelope: {}", body);
    assert_eq!(body["code"], code, "unexpected code: {}", body);
    Ok(body)
}
