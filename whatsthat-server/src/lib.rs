//! whatsthat-server library
//!
//! Venue song-request service: guests submit prompts, a music-generation API
//! produces tracks asynchronously, and each venue's playback page reads its
//! queue.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use whatsthat_common::events::EventBus;
use whatsthat_common::SharedStore;

pub mod api;
pub mod config;
pub mod error;
pub mod services;

use services::{Dispatcher, GenerationApi, Intake, PromptAssistant, Reconciler};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub events: EventBus,
    pub reconciler: Arc<Reconciler>,
    pub intake: Arc<Intake>,
    /// Configured public origin; `None` derives it from the request Host
    pub public_base_url: Option<String>,
}

impl AppState {
    /// Wire the services around `store`.
    ///
    /// `generation` is `None` when no generation API key is configured.
    pub fn new(
        store: SharedStore,
        events: EventBus,
        generation: Option<Arc<dyn GenerationApi>>,
        assistant: PromptAssistant,
        messages_dir: PathBuf,
        public_base_url: Option<String>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), generation.clone()));
        let reconciler = Arc::new(Reconciler::new(store.clone(), events.clone(), generation));
        let intake = Arc::new(Intake::new(
            store.clone(),
            dispatcher,
            assistant,
            events.clone(),
            messages_dir,
        ));

        Self {
            store,
            events,
            reconciler,
            intake,
            public_base_url,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let venue = Router::new()
        .route("/venue/create", post(api::venue::create_venue))
        .route("/venue/:venue_id/info", get(api::venue::venue_info))
        .route("/venue/:venue_id/update", post(api::venue::update_venue))
        .route(
            "/venue/:venue_id/genres",
            get(api::venue::get_genres).post(api::venue::update_genres),
        )
        .route("/venue/:venue_id/settings", post(api::venue::update_settings))
        .route(
            "/venue/:venue_id/tables",
            get(api::tables::list_tables).post(api::tables::create_table),
        )
        .route(
            "/venue/:venue_id/table/:table_id/update",
            post(api::tables::update_table),
        )
        .route(
            "/venue/:venue_id/live-tables/status",
            get(api::tables::live_tables_status),
        );

    let queue = Router::new()
        .route("/venue/:venue_id/queue", get(api::queue::get_queue))
        .route("/venue/:venue_id/queue/next", get(api::queue::next_song))
        .route("/venue/:venue_id/queue/remove", post(api::queue::remove_song))
        .route("/venue/:venue_id/events", get(api::sse::venue_events));

    let generation = Router::new()
        .route("/send", post(api::submit::send_message))
        .route("/status/:task_id", get(api::status::task_status))
        .route("/callback/music", post(api::callback::music_callback))
        .route("/callback/wav", post(api::callback::wav_callback));

    let demo = Router::new()
        .route("/demo/generate", post(api::demo::generate_demo))
        .route("/demo/:demo_id/submit", post(api::demo::demo_submit))
        .route("/demo/:demo_id/queue", get(api::demo::demo_queue));

    Router::new()
        .merge(venue)
        .merge(queue)
        .merge(generation)
        .merge(demo)
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
