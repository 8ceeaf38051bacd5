//! Integration tests for whatsthat-server API endpoints
//!
//! Tests cover:
//! - Health and error envelope
//! - Song submission (validation, genre rules, placeholder entries)
//! - Callback and poll reconciliation (idempotence, terminal, error, pending)
//! - Queue next/remove
//! - Venue, table and demo administration

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method
use whatsthat_common::events::EventBus;
use whatsthat_common::models::{TrackUpdate, Venue};
use whatsthat_common::store::MemoryStore;
use whatsthat_common::SharedStore;
use whatsthat_server::services::{GenerationApi, GenerationError, PromptAssistant, TaskStatus};
use whatsthat_server::{build_router, AppState};

/// Generation API double: hands out sequential task ids and reports
/// whatever status a test scripted for a task (pending otherwise).
#[derive(Default)]
struct FakeGeneration {
    issued: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
    callbacks: Mutex<Vec<Option<String>>>,
    statuses: Mutex<HashMap<String, Result<TaskStatus, u16>>>,
}

impl FakeGeneration {
    fn script(&self, task_id: &str, status: Result<TaskStatus, u16>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(task_id.to_string(), status);
    }
}

#[async_trait]
impl GenerationApi for FakeGeneration {
    async fn generate(
        &self,
        prompt: &str,
        callback_url: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.callbacks
            .lock()
            .unwrap()
            .push(callback_url.map(str::to_string));
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        Ok(format!("task-{}", issued))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, GenerationError> {
        match self.statuses.lock().unwrap().get(task_id) {
            Some(Ok(status)) => Ok(status.clone()),
            Some(Err(code)) => Err(GenerationError::Http(*code)),
            None => Ok(TaskStatus::Pending),
        }
    }
}

struct TestApp {
    router: Router,
    store: SharedStore,
    generation: Arc<FakeGeneration>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "bar.example:5000");
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, json)
    }
}

/// Test helper: app over an in-memory store with generation enabled
fn setup_app() -> TestApp {
    setup_app_with(Some(Arc::new(FakeGeneration::default())))
}

fn setup_app_with(generation: Option<Arc<FakeGeneration>>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store: SharedStore = Arc::new(MemoryStore::new());
    let api = generation.clone().map(|g| g as Arc<dyn GenerationApi>);
    let state = AppState::new(
        store.clone(),
        EventBus::default(),
        api,
        PromptAssistant::disabled(),
        dir.path().join("messages"),
        None,
    );

    TestApp {
        router: build_router(state),
        store,
        generation: generation.unwrap_or_default(),
        _dir: dir,
    }
}

async fn add_venue(app: &TestApp, id: &str) {
    app.store.put_venue(Venue::new(id, "Harbor Bar")).await.unwrap();
}

fn complete_callback(task_id: &str, stream_url: &str, title: &str) -> Value {
    json!({
        "code": 200,
        "msg": "All generated successfully.",
        "data": {
            "callbackType": "complete",
            "task_id": task_id,
            "data": [
                {"id": "clip-1", "title": title, "stream_audio_url": stream_url, "audio_url": ""},
                {"id": "clip-2", "title": "second take", "stream_audio_url": "ignored"}
            ]
        }
    })
}

// =============================================================================
// Health and envelope
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();
    let (status, body) = app.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "whatsthat-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let app = setup_app();
    let (status, body) = app.send("GET", "/api/buildinfo", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_unknown_venue_returns_404_envelope() {
    let app = setup_app();
    let (status, body) = app.send("GET", "/venue/nope/info", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Venue not found");
    assert_eq!(body["code"], "NOT_FOUND");
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_send_without_json_is_rejected() {
    let app = setup_app();
    let (status, body) = app.send("POST", "/send", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No JSON data received");
}

#[tokio::test]
async fn test_send_blank_message_is_rejected() {
    let app = setup_app();
    let (status, body) = app.send("POST", "/send", Some(json!({"message": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Empty message");
}

#[tokio::test]
async fn test_send_disallowed_genre_is_rejected() {
    let app = setup_app();
    let mut venue = Venue::new("v1", "Harbor Bar");
    venue.allowed_genres = vec!["jazz".into()];
    app.store.put_venue(venue).await.unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/send",
            Some(json!({"message": "loud", "venue_id": "v1", "genre": "metal"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Genre \"metal\" is not allowed for this venue. Allowed genres: jazz"
    );
    assert!(app.generation.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_queues_placeholder_and_tracks_task() {
    let app = setup_app();
    add_venue(&app, "v1").await;

    let (status, body) = app
        .send(
            "POST",
            "/send",
            Some(json!({"message": "ferry at dawn", "venue_id": "v1", "table_id": "t1", "genre": "jazz"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["music_generation"]["status"], "processing");
    assert_eq!(body["music_generation"]["task_id"], "task-1");
    assert_eq!(body["venue_id"], "v1");

    assert_eq!(
        app.generation.prompts.lock().unwrap()[0],
        "Make a jazz song about: ferry at dawn"
    );
    assert_eq!(
        app.generation.callbacks.lock().unwrap()[0].as_deref(),
        Some("http://bar.example:5000/callback/music")
    );

    let (_, queue) = app.send("GET", "/venue/v1/queue", None).await;
    assert_eq!(queue["queue_length"], 1);
    assert_eq!(queue["queue"][0]["status"], "generating");
    assert_eq!(queue["queue"][0]["title"], "ferry at dawn");

    let requests = app.store.table_requests("t1").await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_active());
}

#[tokio::test]
async fn test_send_without_generation_key_reports_disabled() {
    let app = setup_app_with(None);
    add_venue(&app, "v1").await;

    let (status, body) = app
        .send("POST", "/send", Some(json!({"message": "hello", "venue_id": "v1"})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["music_generation"]["status"], "disabled");
    assert!(app.store.queue("v1").await.unwrap().is_empty());
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_duplicate_callback_yields_one_entry() {
    let app = setup_app();
    app.store.track_task("task-9", "v1").await.unwrap();

    let payload = complete_callback("task-9", "https://cdn.example/s9", "Harbor Lights");
    for _ in 0..2 {
        let (status, body) = app.send("POST", "/callback/music", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let queue = app.store.queue("v1").await.unwrap();
    assert_eq!(queue.len(), 1);
    let entry = queue.head().unwrap();
    assert_eq!(entry.title, "Harbor Lights");
    assert_eq!(entry.stream_url.as_deref(), Some("https://cdn.example/s9"));
    assert!(entry.is_ready());
}

#[tokio::test]
async fn test_concurrent_callbacks_yield_one_entry() {
    let app = setup_app();
    app.store.track_task("task-9", "v1").await.unwrap();

    let payload = complete_callback("task-9", "https://cdn.example/s9", "Harbor Lights");
    let (a, b) = tokio::join!(
        app.send("POST", "/callback/music", Some(payload.clone())),
        app.send("POST", "/callback/music", Some(payload.clone())),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    assert_eq!(app.store.queue("v1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_terminal_callback_stops_tracking() {
    let app = setup_app();
    app.store.track_task("task-9", "v1").await.unwrap();

    app.send(
        "POST",
        "/callback/music",
        Some(complete_callback("task-9", "https://cdn.example/s9", "Harbor Lights")),
    )
    .await;

    assert_eq!(app.store.task_venue("task-9").await.unwrap(), None);
    assert!(app.store.pending_tasks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_callback_creates_no_entry() {
    let app = setup_app();
    app.store.track_task("task-9", "v1").await.unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/callback/music",
            Some(json!({"code": 531, "msg": "Generation failed", "data": {"taskId": "task-9"}})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Suno API error: Generation failed");
    assert!(app.store.queue("v1").await.unwrap().is_empty());
    assert_eq!(app.store.task_venue("task-9").await.unwrap(), None);
}

#[tokio::test]
async fn test_callback_for_untracked_task_creates_no_entry() {
    let app = setup_app();
    let (_, body) = app
        .send(
            "POST",
            "/callback/music",
            Some(complete_callback("stranger", "https://cdn.example/s", "Nobody's Song")),
        )
        .await;

    assert_eq!(body["success"], true);
    assert!(app.store.list_venues().await.unwrap().is_empty());
    assert!(app.store.queue("v1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_poll_completes_ready_task() {
    let app = setup_app();
    add_venue(&app, "v1").await;
    app.send("POST", "/send", Some(json!({"message": "night swim", "venue_id": "v1"})))
        .await;

    app.generation.script(
        "task-1",
        Ok(TaskStatus::Track(TrackUpdate {
            title: Some("Upstream Title".into()),
            stream_url: Some("https://cdn.example/s1".into()),
            audio_url: None,
        })),
    );

    let (_, queue) = app.send("GET", "/venue/v1/queue", None).await;
    assert_eq!(queue["queue_length"], 1);
    assert_eq!(queue["queue"][0]["status"], "ready");
    assert_eq!(queue["queue"][0]["title"], "night swim");
    assert_eq!(queue["queue"][0]["stream_url"], "https://cdn.example/s1");
    assert_eq!(app.store.task_venue("task-1").await.unwrap(), None);
}

#[tokio::test]
async fn test_pending_poll_keeps_mapping() {
    let app = setup_app();
    app.store.track_task("task-5", "v1").await.unwrap();

    let (_, queue) = app.send("GET", "/venue/v1/queue", None).await;
    assert_eq!(queue["queue_length"], 0);
    assert_eq!(
        app.store.task_venue("task-5").await.unwrap().as_deref(),
        Some("v1")
    );
}

#[tokio::test]
async fn test_transport_failure_keeps_mapping() {
    let app = setup_app();
    app.store.track_task("task-5", "v1").await.unwrap();
    app.generation.script("task-5", Err(502));

    app.send("GET", "/venue/v1/queue", None).await;
    assert!(app.store.task_venue("task-5").await.unwrap().is_some());
}

#[tokio::test]
async fn test_poll_error_code_drops_task() {
    let app = setup_app();
    app.store.track_task("task-5", "v1").await.unwrap();
    app.generation
        .script("task-5", Ok(TaskStatus::Failed("Sensitive word".into())));

    let (_, queue) = app.send("GET", "/venue/v1/queue", None).await;
    assert_eq!(queue["queue_length"], 0);
    assert_eq!(app.store.task_venue("task-5").await.unwrap(), None);
}

#[tokio::test]
async fn test_status_endpoint_reports_success() {
    let app = setup_app();
    app.generation.script(
        "task-3",
        Ok(TaskStatus::Track(TrackUpdate {
            title: Some("Done".into()),
            stream_url: None,
            audio_url: Some("https://cdn.example/a3.mp3".into()),
        })),
    );

    let (status, body) = app.send("GET", "/status/task-3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["audio_url"], "https://cdn.example/a3.mp3");

    let (_, pending) = app.send("GET", "/status/task-4", None).await;
    assert_eq!(pending["status"], "processing");
}

#[tokio::test]
async fn test_wav_callback_is_acknowledged() {
    let app = setup_app();
    let (status, body) = app
        .send("POST", "/callback/wav", Some(json!({"code": 200, "data": {}})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

// =============================================================================
// Queue next / remove
// =============================================================================

#[tokio::test]
async fn test_queue_next_and_remove() {
    let app = setup_app();
    add_venue(&app, "v1").await;
    for message in ["first", "second", "third"] {
        app.send("POST", "/send", Some(json!({"message": message, "venue_id": "v1"})))
            .await;
    }

    let (_, next) = app.send("GET", "/venue/v1/queue/next", None).await;
    assert_eq!(next["status"], "success");
    assert_eq!(next["song"]["task_id"], "task-1");

    let (_, removed) = app
        .send("POST", "/venue/v1/queue/remove", Some(json!({"task_id": "task-2"})))
        .await;
    assert_eq!(removed["message"], "Song removed");

    let (_, popped) = app.send("POST", "/venue/v1/queue/remove", None).await;
    assert_eq!(popped["status"], "success");
    assert_eq!(popped["removed"]["task_id"], "task-1");

    let queue = app.store.queue("v1").await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.head().unwrap().task_id, "task-3");
}

#[tokio::test]
async fn test_remove_from_empty_queue() {
    let app = setup_app();
    let (_, body) = app.send("POST", "/venue/v1/queue/remove", None).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Queue is empty");

    let (_, next) = app.send("GET", "/venue/v1/queue/next", None).await;
    assert_eq!(next["status"], "empty");
}

// =============================================================================
// Venue administration
// =============================================================================

#[tokio::test]
async fn test_create_venue_with_tables() {
    let app = setup_app();
    let (status, body) = app
        .send("POST", "/venue/create", Some(json!({"name": "Dockside", "num_tables": 2})))
        .await;

    assert_eq!(status, StatusCode::OK);
    let venue_id = body["venue_id"].as_str().unwrap().to_string();
    assert_eq!(venue_id.len(), 8);
    assert_eq!(
        body["submit_url"],
        format!("http://bar.example:5000/venue/{}/submit", venue_id)
    );
    assert!(body["submit_qr"]
        .as_str()
        .unwrap()
        .starts_with("https://api.qrserver.com/"));
    assert_eq!(body["tables"].as_array().unwrap().len(), 2);
    assert_eq!(body["tables"][1]["name"], "Table 2");

    let (_, info) = app.send("GET", &format!("/venue/{}/info", venue_id), None).await;
    assert_eq!(info["name"], "Dockside");
    assert_eq!(info["tables"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_settings_update_filters_genres() {
    let app = setup_app();
    add_venue(&app, "v1").await;

    let (status, body) = app
        .send(
            "POST",
            "/venue/v1/settings",
            Some(json!({
                "allowed_genres": ["jazz", "polka"],
                "explicit_content": false,
                "custom_instructions": "  no breakup songs "
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed_genres"], json!(["jazz"]));

    let venue = app.store.get_venue("v1").await.unwrap().unwrap();
    assert_eq!(venue.explicit_content, Some(false));
    assert_eq!(venue.custom_instructions.as_deref(), Some("no breakup songs"));

    let (status, body) = app
        .send("POST", "/venue/v1/genres", Some(json!({"allowed_genres": "jazz"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "allowed_genres must be a list");
}

#[tokio::test]
async fn test_table_lifecycle() {
    let app = setup_app();
    add_venue(&app, "v1").await;

    let (_, created) = app.send("POST", "/venue/v1/tables", Some(json!({"name": "Patio"}))).await;
    let table_id = created["table_id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Patio");

    let (status, body) = app
        .send(
            "POST",
            &format!("/venue/v1/table/{}/update", table_id),
            Some(json!({"name": " "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Table name cannot be empty");

    let (status, _) = app
        .send("POST", "/venue/v1/table/missing/update", Some(json!({"name": "Bar"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.send(
        "POST",
        "/send",
        Some(json!({"message": "patio party", "venue_id": "v1", "table_id": table_id})),
    )
    .await;

    let (_, tables) = app.send("GET", "/venue/v1/tables", None).await;
    assert_eq!(tables["tables"][0]["request_count"], 1);

    let (_, live) = app.send("GET", "/venue/v1/live-tables/status", None).await;
    assert_eq!(live["venue_name"], "Harbor Bar");
    assert_eq!(live["tables"][0]["has_active_request"], true);
    assert_eq!(live["tables"][0]["recent_request_count"], 1);
}

// =============================================================================
// Demo venues
// =============================================================================

#[tokio::test]
async fn test_demo_generate_requires_fields() {
    let app = setup_app();
    let (status, body) = app
        .send("POST", "/demo/generate", Some(json!({"venue_name": "Harbor Bar"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Venue name, city, and business email are required");
}

#[tokio::test]
async fn test_demo_flow() {
    let app = setup_app();
    let request = json!({
        "venue_name": "Harbor Bar",
        "business_email": "owner@harbor.example",
        "city": "Portland",
        "venue_type": "bar"
    });

    let (_, first) = app.send("POST", "/demo/generate", Some(request.clone())).await;
    let (_, second) = app.send("POST", "/demo/generate", Some(request)).await;
    assert_eq!(first["demo_id"], second["demo_id"]);
    let demo_id = first["demo_id"].as_str().unwrap().to_string();

    let venue = app.store.get_venue(&demo_id).await.unwrap().unwrap();
    assert!(venue.is_demo);
    assert_eq!(venue.city.as_deref(), Some("Portland"));

    let (status, body) = app
        .send("POST", &format!("/demo/{}/submit", demo_id), Some(json!({"message": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");

    let (status, _) = app
        .send("POST", &format!("/demo/{}/submit", demo_id), Some(json!({"message": "sea breeze"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.table_requests("demo-table-1").await.unwrap().len(), 1);

    let (_, queue) = app.send("GET", &format!("/demo/{}/queue", demo_id), None).await;
    assert_eq!(queue["queue_length"], 1);
}
