//! Webhook server for Facebook Messenger
//!
//! Answers the subscription handshake and hands decoded messaging events to
//! an [`EventHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::api::Messenger;
use crate::error::{MessengerError, Result};
use crate::webhook::{HubParams, Incoming, WebhookMessaging, WebhookPayload};

/// Body returned for accepted events
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Receives messaging events from the webhook
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &WebhookMessaging) -> Result<()>;
}

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub messenger: Arc<Messenger>,
    pub handler: Arc<dyn EventHandler>,
}

/// Create webhook router
pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(handle_webhook).post(handle_webhook))
        .with_state(Arc::new(state))
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let hub = HubParams::from_pairs(query);
    let incoming = match state.messenger.listen(&hub, &body) {
        Ok(incoming) => incoming,
        Err(e) if method == Method::GET && hub.verify_token.is_some() => {
            warn!("Rejected webhook verification: {}", e);
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(e) => {
            warn!("Rejected webhook request: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match incoming {
        Incoming::Challenge(challenge) => {
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        Incoming::Event(value) => {
            let payload = match WebhookPayload::from_value(&value) {
                Ok(payload) => payload,
                Err(e) => {
                    // Valid JSON is acknowledged so Facebook does not redeliver it
                    warn!("Webhook body does not match the event layout, skipping: {}", e);
                    return (StatusCode::OK, EVENT_RECEIVED).into_response();
                }
            };

            debug!("Received webhook for object: {:?}", payload.object);
            dispatch_events(state.handler.as_ref(), &payload).await;

            (StatusCode::OK, EVENT_RECEIVED).into_response()
        }
    }
}

async fn dispatch_events(handler: &dyn EventHandler, payload: &WebhookPayload) {
    for event in payload.messaging_events() {
        if let Err(e) = handler.handle_event(event).await {
            // Continue processing other events
            error!("Error handling messaging event: {}", e);
        }
    }
}

/// Start webhook server
pub async fn start_webhook_server(state: WebhookState, port: u16) -> Result<()> {
    let app = create_webhook_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MessengerError::Server(e.to_string()))?;

    info!("Messenger webhook server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| MessengerError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request;
    use serde_json::json;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &WebhookMessaging) -> Result<()> {
            let text = event
                .message
                .as_ref()
                .and_then(|m| m.text.clone())
                .unwrap_or_default();
            if text == "fail" {
                return Err(MessengerError::InvalidPayload("handler refused".to_string()));
            }
            self.seen.lock().await.push(text);
            Ok(())
        }
    }

    fn router() -> (Router, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let state = WebhookState {
            messenger: Arc::new(Messenger::new("tok", Some("secret")).unwrap()),
            handler: handler.clone(),
        };
        (create_webhook_router(state), handler)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_verification_returns_challenge() {
        let (app, handler) = router();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=secret&hub.challenge=CHALLENGE_ACCEPTED")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "CHALLENGE_ACCEPTED");
        assert!(handler.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_verification_with_wrong_token_is_forbidden() {
        let (app, _) = router();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_events_are_dispatched() {
        let (app, handler) = router();
        let body = json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "messaging": [
                    { "sender": { "id": "u1" }, "message": { "mid": "m1", "text": "one" } },
                    { "sender": { "id": "u1" }, "message": { "mid": "m2", "text": "fail" } },
                    { "sender": { "id": "u2" }, "message": { "mid": "m3", "text": "two" } }
                ]
            }]
        });

        let response = app
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, EVENT_RECEIVED);
        assert_eq!(*handler.seen.lock().await, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_verification_accepts_both_spellings() {
        let (app, _) = router();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.verify_token=secret&hub_verify_token=secret&hub.challenge=C")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "C");
    }

    async fn post_json(app: Router, body: serde_json::Value) -> Response {
        app.oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_sparse_events_do_not_block_batch() {
        let (app, handler) = router();
        let body = json!({
            "object": "page",
            "entry": [
                { "id": 1234, "messaging": [
                    { "sender": { "id": "u" }, "read": {} },
                    { "sender": { "user_ref": "r" }, "optin": {} },
                    { "sender": { "id": "u1" }, "message": { "mid": "m1", "text": "still here" } }
                ] }
            ]
        });

        let response = post_json(app, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, EVENT_RECEIVED);
        let seen = handler.seen.lock().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], "still here");
    }

    #[tokio::test]
    async fn test_unexpected_json_shape_is_acknowledged() {
        let (app, handler) = router();
        let response = post_json(app, json!([1, 2])).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, EVENT_RECEIVED);
        assert!(handler.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let (app, _) = router();
        let response = app
            .oneshot(
                Request::post("/webhook")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
