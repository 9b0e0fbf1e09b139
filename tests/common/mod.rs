#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use room_inventory::auth::{generate_jwt, Claims};

pub const TEST_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // In-memory backend so the suite runs without PostgreSQL
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_room-inventory"));
        cmd.args(["serve", "--memory", "--port", &port.to_string()])
            .env("APP_ENV", "development")
            .env("SECURITY_JWT_SECRET", TEST_SECRET)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// `Authorization` header value accepted by the test server
pub fn bearer() -> String {
    let token = generate_jwt(&Claims::new("integration", 1), TEST_SECRET).expect("token");
    format!("Bearer {}", token)
}

/// Short random suffix so tests sharing one server never collide
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

pub fn building_body(id: &str) -> Value {
    json!({"id": id, "site": "Main", "designation": "Main Campus"})
}

pub fn room_body(id: &str, building_id: &str) -> Value {
    json!({
        "room": {
            "id": id,
            "function": "Office",
            "ceilingArea": 18.5,
            "outlets": 4,
            "buildingId": building_id
        },
        "doors": [{"type": "Wood", "count": 1}],
        "windows": [{"type": "Double", "count": 2}],
        "walls": [{"type": "Plaster", "surface": 40}],
        "floors": [{"type": "Tile", "surface": 18.5}],
        "lamps": [{"type": "LED", "count": 3}, {"type": "Fluorescent", "count": 1}]
    })
}

pub async fn create_building(client: &reqwest::Client, server: &TestServer, id: &str) -> Result<()> {
    let res = client
        .post(server.url("/api/buildings"))
        .header("Authorization", bearer())
        .json(&building_body(id))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create building: {}", res.status());
    Ok(())
}

pub async fn create_room(client: &reqwest::Client, server: &TestServer, id: &str, building_id: &str) -> Result<()> {
    let res = client
        .post(server.url("/api/rooms"))
        .header("Authorization", bearer())
        .json(&room_body(id, building_id))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create room: {}", res.status());
    Ok(())
}
