//! HTTP clients against a scripted local server: one canned response per
//! connection, every request recorded.

use std::sync::{Arc, Mutex};

use coursegen::publish::HttpPublisher;
use coursegen::store::HttpDocumentStore;
use coursegen::text_generation::ChatCompletionsClient;
use coursegen_core::config::{GenerationConfig, PublishConfig, StoreConfig};
use coursegen_core::course::CourseDefinition;
use coursegen_core::contract::{
    DocumentStore, GenerateRequest, GenerationError, PublishError, Publisher, StoreError,
    TextGenerator,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

fn reply(status: u16, body: impl Into<String>) -> Reply {
    Reply {
        status,
        headers: Vec::new(),
        body: body.into(),
    }
}

fn rate_limited(retry_after_secs: u64) -> Reply {
    Reply {
        status: 429,
        headers: vec![("Retry-After", retry_after_secs.to_string())],
        body: "slow down".into(),
    }
}

struct ScriptedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);

                let mut out = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    reply.status,
                    reply.body.len()
                );
                for (name, value) in &reply.headers {
                    out.push_str(&format!("{name}: {value}\r\n"));
                }
                out.push_str("\r\n");
                out.push_str(&reply.body);
                let _ = socket.write_all(out.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + body_len {
            break;
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn generation_config(api_url: String, max_retries: u32) -> GenerationConfig {
    GenerationConfig {
        api_url,
        model: "test-model".into(),
        timeout_secs: 5,
        max_retries,
        temperature: 0.0,
        api_key: Some("sk-test".into()),
    }
}

fn completion(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
}

fn course_json() -> String {
    json!({
        "meta": { "title": "Intro to tokio", "description": "Spawning tasks" },
        "steps": [{ "id": "spawn", "title": "Spawn", "content": "Call `tokio::spawn`." }]
    })
    .to_string()
}

fn course() -> CourseDefinition {
    serde_json::from_str(&course_json()).unwrap()
}

#[tokio::test]
async fn chat_client_retries_after_rate_limit() {
    let server = ScriptedServer::start(vec![
        rate_limited(0),
        reply(200, completion(&format!("```json\n{}\n```", course_json()))),
    ])
    .await;
    let client = ChatCompletionsClient::new(generation_config(server.base_url.clone(), 2)).unwrap();

    let course = client
        .generate_json(GenerateRequest {
            transcript: "[00:00] hello",
            video_url: None,
        })
        .await
        .unwrap();

    assert_eq!(course.meta.title, "Intro to tokio");
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("POST / HTTP/1.1"));
    assert!(requests[0].to_lowercase().contains("authorization: bearer sk-test"));
    assert!(requests[0].contains("test-model"));
}

#[tokio::test]
async fn chat_client_gives_up_after_max_retries() {
    let server = ScriptedServer::start(vec![rate_limited(0), rate_limited(0), rate_limited(0)]).await;
    let client = ChatCompletionsClient::new(generation_config(server.base_url.clone(), 1)).unwrap();

    let err = client
        .generate_html(&course())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::RateLimited { .. }));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn chat_client_does_not_retry_server_errors() {
    let server = ScriptedServer::start(vec![reply(503, "overloaded"), reply(200, completion("<html></html>"))]).await;
    let client = ChatCompletionsClient::new(generation_config(server.base_url.clone(), 3)).unwrap();

    let err = client
        .generate_html(&course())
        .await
        .unwrap_err();

    match err {
        GenerationError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(server.requests().len(), 1);
}

fn store_for(server: &ScriptedServer) -> HttpDocumentStore {
    HttpDocumentStore::new(&StoreConfig {
        base_url: server.base_url.clone(),
        database: "courses".into(),
        api_key: Some("store-token".into()),
    })
}

#[tokio::test]
async fn store_maps_missing_documents() {
    let server = ScriptedServer::start(vec![reply(404, ""), reply(404, ""), reply(404, "")]).await;
    let store = store_for(&server);

    assert!(store.get_document("courses", "abc").await.unwrap().is_none());
    assert!(matches!(
        store.update_document("courses", "abc", json!({"version": 2}), 1).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete_document("courses", "abc").await,
        Err(StoreError::NotFound { .. })
    ));

    let requests = server.requests();
    assert!(requests[0].starts_with("GET /courses/abc HTTP/1.1"));
    assert!(requests[0].to_lowercase().contains("authorization: bearer store-token"));
    assert!(requests[1].starts_with("PUT /courses/abc HTTP/1.1"));
    assert!(requests[2].starts_with("DELETE /courses/abc HTTP/1.1"));
}

#[tokio::test]
async fn store_update_is_conditional_on_version() {
    let server = ScriptedServer::start(vec![reply(412, ""), reply(409, ""), reply(204, "")]).await;
    let store = store_for(&server);

    for _ in 0..2 {
        assert!(matches!(
            store.update_document("courses", "abc", json!({"version": 4}), 3).await,
            Err(StoreError::VersionMismatch { expected: 3, .. })
        ));
    }
    store
        .update_document("courses", "abc", json!({"version": 4}), 3)
        .await
        .unwrap();

    for request in server.requests() {
        assert!(
            request.to_lowercase().contains("if-match: \"3\""),
            "missing If-Match in {request}"
        );
    }
}

#[tokio::test]
async fn store_lists_and_reads_documents() {
    let server = ScriptedServer::start(vec![
        reply(200, json!([{ "key": "a", "value": { "title": "A" } }]).to_string()),
        reply(200, json!({ "title": "A" }).to_string()),
        reply(409, ""),
        reply(500, "disk full"),
    ])
    .await;
    let store = store_for(&server);

    let listed = store.list_documents("courses").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "a");
    assert_eq!(
        store.get_document("courses", "a").await.unwrap(),
        Some(json!({ "title": "A" }))
    );
    assert!(matches!(
        store.create_document("courses", "a", json!({})).await,
        Err(StoreError::AlreadyExists { .. })
    ));
    assert!(matches!(
        store.get_document("courses", "b").await,
        Err(StoreError::Api { status: 500, .. })
    ));
}

fn publisher_for(server: &ScriptedServer) -> HttpPublisher {
    HttpPublisher::new(&PublishConfig {
        endpoint: format!("{}/publish", server.base_url),
        max_attempts: 3,
    })
    .unwrap()
}

#[tokio::test]
async fn publisher_maps_conflict_to_id_collision() {
    let server = ScriptedServer::start(vec![
        reply(409, "taken"),
        reply(200, json!({ "url": "https://pages.example.com/abc123" }).to_string()),
    ])
    .await;
    let publisher = publisher_for(&server);

    assert!(matches!(
        publisher.publish("abc123", "PGh0bWw+").await,
        Err(PublishError::IdCollision(id)) if id == "abc123"
    ));
    assert_eq!(
        publisher.publish("abc123", "PGh0bWw+").await.unwrap(),
        "https://pages.example.com/abc123"
    );

    let requests = server.requests();
    assert!(requests[1].starts_with("POST /publish HTTP/1.1"));
    assert!(requests[1].contains("\"id\":\"abc123\""));
    assert!(requests[1].contains("\"html\":\"PGh0bWw+\""));
}

#[tokio::test]
async fn publisher_surfaces_other_errors() {
    let server = ScriptedServer::start(vec![reply(500, "boom")]).await;
    let publisher = publisher_for(&server);

    assert!(matches!(
        publisher.publish("abc123", "PGh0bWw+").await,
        Err(PublishError::Api { status: 500, .. })
    ));
}
