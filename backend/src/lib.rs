pub mod chat;
pub mod chat_handlers;
pub mod config;
pub mod conversation_store;
pub mod directions;
pub mod enrichment;
pub mod error;
pub mod geocoder;
pub mod geometry;
pub mod gpx_export;
pub mod http_clients;
pub mod llm;
pub mod models;
pub mod narrative;
pub mod prompt_loader;
pub mod route_service;

use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::chat::ChatService;
use crate::chat_handlers::chat_handler;
use crate::config::Settings;
use crate::conversation_store::ConversationStore;
use crate::directions::OrsDirections;
use crate::geocoder::{CachedGeocoder, Geocoder, YandexGeocoder};
use crate::http_clients::HttpClients;
use crate::llm::OpenAiResponses;
use crate::models::{HealthResponse, RouteRequest, RouteResponse};
use crate::prompt_loader::PromptLoader;
use crate::route_service::RouteService;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteService>,
    /// Absent when no model API key is configured.
    pub chat: Option<Arc<ChatService>>,
}

impl AppState {
    /// Wire the production providers. Fails only if the conversation
    /// directory cannot be created.
    pub fn from_settings(settings: &Settings, clients: &HttpClients) -> io::Result<Self> {
        let yandex = YandexGeocoder::new(
            clients.geocoder.clone(),
            settings.yandex_geocoder_url.clone(),
            settings.yandex_geocoder_api_key.clone(),
            settings.rev_geocoder_concurrency,
        );
        let geocoder: Arc<dyn Geocoder> = match NonZeroUsize::new(settings.rev_geocoder_cache_size) {
            Some(capacity) => Arc::new(CachedGeocoder::new(yandex, capacity)),
            None => Arc::new(yandex),
        };
        let directions = OrsDirections::new(
            clients.directions.clone(),
            settings.ors_directions_url.clone(),
            settings.ors_api_key.clone(),
        );
        let routes = Arc::new(RouteService::new(geocoder, Arc::new(directions)));

        let chat = match settings.openai_key() {
            Some(key) => {
                let model = OpenAiResponses::new(
                    clients.model.clone(),
                    settings.openai_base_url.clone(),
                    key,
                    settings.model_name.clone(),
                );
                Some(Arc::new(ChatService::new(
                    Arc::new(model),
                    PromptLoader::new(settings.system_prompt_path.clone()),
                    ConversationStore::new(settings.conversations_dir.clone())?,
                    settings.max_history_messages,
                )))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY is not set, /api/chat is disabled");
                None
            }
        };

        Ok(Self { routes, chat })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/route", post(route_handler))
        .route("/api/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    tracing::debug!("healthcheck called");
    Json(HealthResponse::default())
}

/// Always answers 200; pipeline failures travel inside the body.
async fn route_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Json<RouteResponse> {
    tracing::info!("/route called: a={:?} b={:?} options={:?}", req.a, req.b, req.options);
    Json(state.routes.respond(req).await)
}
