//! End-to-end sessions against the server over an in-memory duplex stream.
//!
//! These tests load a real package.json, connect, and talk MCP through
//! `LineClient` the way an agent would over stdio.

use std::fs;
use std::path::Path;

use scriptdeck_mcp::protocol::methods;
use scriptdeck_mcp::{ScriptRunner, ScriptServer, ServerConfig};
use scriptdeck_protocol::LineClient;
use serde_json::{json, Value};
use tokio::io::{duplex, split, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

type Client = LineClient<BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>>;

fn config() -> ServerConfig {
    ServerConfig {
        builtin_tools: false,
        ..ServerConfig::default()
    }
}

/// `sh <dir>/fake-pm.sh run <script> [-- args]` echoes what it was asked to run.
fn fake_runner(dir: &Path) -> ScriptRunner {
    let pm = dir.join("fake-pm.sh");
    fs::write(
        &pm,
        "shift\nname=\"$1\"\nshift\nif [ \"$name\" = \"quiet\" ]; then exit 0; fi\necho \"ran $name in $(basename \"$(pwd -P)\") $*\"\n",
    )
    .unwrap();
    ScriptRunner::new("sh").with_leading_args([pm.display().to_string()])
}

fn connect(server: &ScriptServer) -> (Client, JoinHandle<Result<(), scriptdeck_mcp::ServerError>>) {
    let (client_io, server_io) = duplex(64 * 1024);
    let (server_read, server_write) = split(server_io);
    let serving = server.clone();
    let handle = tokio::spawn(async move { serving.serve(server_read, server_write).await });

    let (client_read, client_write) = split(client_io);
    (LineClient::new(BufReader::new(client_read), client_write), handle)
}

async fn initialize(client: &mut Client) -> Value {
    let resp = client
        .request(
            methods::INITIALIZE,
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "e2e", "version": "1.0.0"}
            }),
        )
        .await
        .unwrap();
    client.notify(methods::INITIALIZED, Value::Null).await.unwrap();
    resp.result.unwrap()
}

async fn disconnect(client: Client, handle: JoinHandle<Result<(), scriptdeck_mcp::ServerError>>) {
    drop(client);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_manifest_tools_visible_on_first_list() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("package.json");
    fs::write(&manifest, r#"{"scripts": {"build": "tsc", "test": "vitest run"}}"#).unwrap();

    let server = ScriptServer::new(config());
    let report = server.load_manifest(&manifest).await.unwrap();
    assert_eq!(report.registered.len(), 2);

    let (mut client, handle) = connect(&server);
    let init = initialize(&mut client).await;
    assert_eq!(init["capabilities"]["tools"]["listChanged"], json!(true));
    assert_eq!(init["serverInfo"]["name"], json!("scriptdeck-mcp"));

    let listed = client.request(methods::TOOLS_LIST, Value::Null).await.unwrap();
    let tools = listed.result.unwrap()["tools"].clone();
    assert_eq!(tools[0]["name"], json!("build"));
    assert_eq!(tools[0]["description"], json!("script: tsc"));
    assert_eq!(tools[1]["name"], json!("test"));
    assert_eq!(tools[1]["description"], json!("script: vitest run"));
    assert_eq!(tools[0]["inputSchema"]["properties"]["args"]["type"], json!("array"));
    assert_eq!(tools.as_array().unwrap().len(), 2);

    // Nothing was announced after connecting; the bulk list was complete up front.
    assert!(client.take_notifications().is_empty());

    disconnect(client, handle).await;
}

#[tokio::test]
async fn test_empty_scripts_serves_no_tools() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("package.json");
    fs::write(&manifest, r#"{"name": "empty", "scripts": {}}"#).unwrap();

    let server = ScriptServer::new(config());
    server.load_manifest(&manifest).await.unwrap();

    let (mut client, handle) = connect(&server);
    initialize(&mut client).await;
    let listed = client.request(methods::TOOLS_LIST, Value::Null).await.unwrap();
    assert_eq!(listed.result.unwrap()["tools"], json!([]));

    disconnect(client, handle).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_call_runs_script_in_manifest_directory() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("webapp");
    fs::create_dir_all(&project).unwrap();
    let manifest = project.join("package.json");
    fs::write(
        &manifest,
        r#"{"scripts": {"build": "tsc", "Build:Prod": "tsc -p prod", "quiet": "true"}}"#,
    )
    .unwrap();

    let server = ScriptServer::with_runner(config(), fake_runner(dir.path()));
    server.load_manifest(&manifest).await.unwrap();

    let (mut client, handle) = connect(&server);
    initialize(&mut client).await;

    let resp = client
        .request(methods::TOOLS_CALL, json!({"name": "build", "arguments": {}}))
        .await
        .unwrap();
    let result = resp.result.unwrap();
    assert_eq!(result["content"], json!([{"type": "text", "text": "ran build in webapp \n"}]));
    assert_eq!(result["isError"], json!(false));

    let resp = client
        .request(
            methods::TOOLS_CALL,
            json!({"name": "build_prod", "arguments": {"args": ["--noEmit"]}}),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.result.unwrap()["content"][0]["text"],
        json!("ran Build:Prod in webapp -- --noEmit\n")
    );

    let resp = client
        .request(methods::TOOLS_CALL, json!({"name": "quiet"}))
        .await
        .unwrap();
    assert_eq!(
        resp.result.unwrap()["content"][0]["text"],
        json!("(script exited with code 0, no output)")
    );

    disconnect(client, handle).await;
}

#[tokio::test]
async fn test_missing_package_manager_is_reported_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("package.json");
    fs::write(&manifest, r#"{"scripts": {"lint": "eslint ."}}"#).unwrap();

    let server = ScriptServer::with_runner(config(), ScriptRunner::new("/nonexistent/scriptdeck-pm"));
    server.load_manifest(&manifest).await.unwrap();

    let (mut client, handle) = connect(&server);
    initialize(&mut client).await;

    let resp = client
        .request(methods::TOOLS_CALL, json!({"name": "lint", "arguments": {}}))
        .await
        .unwrap();
    assert!(resp.error.is_none());
    let result = resp.result.unwrap();
    assert_eq!(result["isError"], json!(false));
    assert!(result["content"][0]["text"].as_str().unwrap().contains("failed to start"));

    disconnect(client, handle).await;
}

#[tokio::test]
async fn test_builtin_hello_is_served() {
    let server = ScriptServer::new(ServerConfig::default());
    server.register_builtins().await;

    let (mut client, handle) = connect(&server);
    initialize(&mut client).await;

    let resp = client
        .request(methods::TOOLS_CALL, json!({"name": "hello", "arguments": {"name": "agent"}}))
        .await
        .unwrap();
    assert_eq!(resp.result.unwrap()["content"][0]["text"], json!("Hello, agent!"));

    disconnect(client, handle).await;
}
