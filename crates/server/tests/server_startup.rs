use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config pointing at a qBittorrent that is not running
fn minimal_config(port: u16) -> String {
    format!(
        r#"
[qbittorrent]
host = "127.0.0.1"
port = {}
username = "admin"
password = "adminadmin"

[server]
host = "127.0.0.1"
port = {}
"#,
        get_available_port(),
        port
    )
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_grabbit-server"))
        .env("GRABBIT_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_starts_without_reachable_qbittorrent() {
    let port = get_available_port();

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(minimal_config(port).as_bytes())
        .unwrap();
    temp_file.flush().unwrap();

    let mut server = spawn_server(temp_file.path()).await;
    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let client = Client::new();

    let health: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(health["status"], "ok");

    // Operations fail with a 500 naming the transport problem
    let response = client
        .get(format!("http://127.0.0.1:{}/plugins", port))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["kind"], "transport");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_hides_credentials() {
    let port = get_available_port();

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(minimal_config(port).as_bytes())
        .unwrap();
    temp_file.flush().unwrap();

    let mut server = spawn_server(temp_file.path()).await;
    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/config", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let text = response.text().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["qbittorrent"]["password_configured"], true);
    assert!(!text.contains("adminadmin"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_grabbit-server"))
            .env("GRABBIT_CONFIG", "/nonexistent/grabbit.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_qbittorrent_section_exits_with_error() {
    let config_without_client = r#"
[server]
port = 8080
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(config_without_client.as_bytes())
        .unwrap();
    temp_file.flush().unwrap();

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_grabbit-server"))
            .env("GRABBIT_CONFIG", temp_file.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
