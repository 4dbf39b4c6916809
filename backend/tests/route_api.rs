use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use hyper::StatusCode;
use routescribe::{
    AppState, create_router,
    chat::ChatService,
    conversation_store::ConversationStore,
    directions::{DirectionsProvider, DirectionsResponse},
    error::RouteError,
    geocoder::{GeocodeResult, Geocoder, PlaceKind},
    llm::{ChatMessage, Completion, LanguageModel, ModelError},
    models::{
        ApiError, ChatResponse, Coordinate, ErrorKind, HealthResponse, ResponseType, RouteOptions,
        RouteResponse,
    },
    prompt_loader::PromptLoader,
    route_service::RouteService,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

/// Forward lookups know two cities; reverse lookups name the town by latitude band.
struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn forward(&self, address: &str) -> Result<Coordinate, RouteError> {
        match address {
            "Москва" => Ok(Coordinate::new(55.75, 37.61)),
            "Клин" => Ok(Coordinate::new(56.33, 36.73)),
            other => Err(RouteError::UnresolvableAddress {
                address: other.to_string(),
                details: "no matching features".into(),
            }),
        }
    }

    async fn reverse(&self, at: Coordinate, _kind: Option<PlaceKind>) -> Result<GeocodeResult, RouteError> {
        let name = if at.lat < 55.9 {
            "Москва"
        } else if at.lat < 56.1 {
            "Солнечногорск"
        } else {
            "Клин"
        };
        let mut result = GeocodeResult::default();
        result.components.insert("locality".into(), name.into());
        Ok(result)
    }
}

struct StubDirections(Value);

#[async_trait]
impl DirectionsProvider for StubDirections {
    async fn directions(
        &self,
        _from: Coordinate,
        _to: Coordinate,
        _options: &RouteOptions,
    ) -> Result<DirectionsResponse, RouteError> {
        serde_json::from_value(self.0.clone()).map_err(|e| RouteError::MalformedRoute(e.to_string()))
    }
}

struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, ModelError> {
        let last = messages.last().map(|m| m.text.clone()).unwrap_or_default();
        Ok(Completion {
            text: format!("эхо: {last} ({} messages)", messages.len()),
            response_id: Some("resp_echo".into()),
        })
    }
}

/// Moscow to Klin along a meridian-ish polyline: a short city step and a
/// long highway step crossing Solnechnogorsk.
fn moscow_to_klin() -> Value {
    json!({"features": [{
        "geometry": {"coordinates": [
            [37.61, 55.75], [37.60, 55.76], [37.40, 55.90], [37.00, 56.10], [36.73, 56.33]
        ]},
        "properties": {
            "summary": {"distance": 84_000.0, "duration": 4_000.0},
            "segments": [{"steps": [
                {"distance": 1_300.0, "duration": 120.0, "instruction": "Направо", "name": "Тверская", "way_points": [0, 1]},
                {"distance": 82_700.0, "duration": 3_880.0, "instruction": "Прямо", "name": "М-11", "way_points": [1, 4]}
            ]}]
        }
    }]})
}

fn routes(answer: Value) -> Arc<RouteService> {
    Arc::new(RouteService::new(Arc::new(StubGeocoder), Arc::new(StubDirections(answer))))
}

fn test_app(answer: Value) -> axum::Router {
    create_router(AppState {
        routes: routes(answer),
        chat: None,
    })
}

fn chat_app(dir: &TempDir) -> axum::Router {
    std::fs::write(dir.path().join("guide.md"), "Ты штурман.").unwrap();
    let chat = ChatService::new(
        Arc::new(EchoModel),
        PromptLoader::new(dir.path().join("guide.md")),
        ConversationStore::new(dir.path().join("conversations")).unwrap(),
        Some(4),
    );
    create_router(AppState {
        routes: routes(moscow_to_klin()),
        chat: Some(Arc::new(chat)),
    })
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = test_app(json!({})).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: HealthResponse = read_json(response).await;
    assert_eq!(body.status, "ok");
}

#[tokio::test]
async fn route_endpoint_renders_narrative() {
    let payload = json!({
        "a": {"address": "Москва"},
        "b": {"lat": 56.33, "lon": 36.73},
        "options": {"language": "ru", "avoid_tolls": true}
    });
    let response = test_app(moscow_to_klin())
        .oneshot(post_json("/api/route", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: RouteResponse = read_json(response).await;
    assert!(body.ok);
    assert_eq!(body.response_type, ResponseType::Result);
    let markdown = body.markdown.unwrap();
    assert!(markdown.contains("**Итого:** 84,0 км • 1 ч 6 мин"));
    assert!(markdown.contains("### Москва"));
    assert!(markdown.contains("через: **Солнечногорск**"));

    let steps = body.steps.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].idx, 1);
    assert_eq!(steps[1].street.as_deref(), Some("М-11"));
    let via: Vec<_> = steps[1]
        .via_localities
        .iter()
        .flatten()
        .map(|v| v.name.as_str())
        .collect();
    assert!(via.contains(&"Солнечногорск"));
    assert!(!via.contains(&"Москва"));
    assert!(body.gpx_base64.is_none());
}

#[tokio::test]
async fn empty_route_is_reported_in_body() {
    let answer = json!({"features": [{"geometry": {"coordinates": []}, "properties": {"segments": []}}]});
    let payload = json!({"a": {"address": "Москва"}, "b": {"address": "Клин"}});
    let response = test_app(answer).oneshot(post_json("/api/route", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: RouteResponse = read_json(response).await;
    assert!(!body.ok);
    assert_eq!(body.response_type, ResponseType::Error);
    assert_eq!(body.error_kind, Some(ErrorKind::EmptyRoute));
}

#[tokio::test]
async fn missing_features_is_unresolvable_input() {
    let payload = json!({"a": {"address": "Москва"}, "b": {"address": "Клин"}});
    let response = test_app(json!({"features": []}))
        .oneshot(post_json("/api/route", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: RouteResponse = read_json(response).await;
    assert!(!body.ok);
    assert_eq!(body.response_type, ResponseType::Error);
    assert_eq!(body.error_kind, Some(ErrorKind::UnresolvableInput));
    assert_eq!(body.message.as_deref(), Some("directions provider returned no route"));
}

#[tokio::test]
async fn point_without_address_or_coordinates_is_rejected() {
    let payload = json!({"a": {"lat": 55.75}, "b": {"address": "Клин"}});
    let response = test_app(moscow_to_klin())
        .oneshot(post_json("/api/route", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn chat_without_model_is_internal_error() {
    let payload = json!({"user_text": "привет"});
    let response = test_app(json!({})).oneshot(post_json("/api/chat", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ApiError = read_json(response).await;
    assert_eq!(body.message, "chat service is not initialized");
}

#[tokio::test]
async fn chat_continues_a_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let app = chat_app(&dir);

    let first = app
        .clone()
        .oneshot(post_json("/api/chat", &json!({"user_text": "привет"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first: ChatResponse = read_json(first).await;
    assert_eq!(first.assistant_text, "эхо: привет (2 messages)");
    assert_eq!(first.response_id.as_deref(), Some("resp_echo"));

    let payload = json!({"user_text": "куда дальше?", "conversation_id": first.conversation_id});
    let second: ChatResponse = read_json(app.oneshot(post_json("/api/chat", &payload)).await.unwrap()).await;
    assert_eq!(second.conversation_id, first.conversation_id);
    assert_eq!(second.assistant_text, "эхо: куда дальше? (4 messages)");

    let log = dir
        .path()
        .join("conversations")
        .join(format!("{}.jsonl", first.conversation_id));
    assert_eq!(std::fs::read_to_string(log).unwrap().lines().count(), 4);
}
