//! HTTP ingress. Handlers validate the request shape and publish an event;
//! all work happens in listeners.

use crate::gateway::{ChatGateway, InboundMessage};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatflow_conversation::event::{
    FLOW_CONFIG_UPLOADED, LEAD_CREATED, LEAD_REPLIED, LEAD_STATUS_CHANGED, SYSTEM_EVENTS,
};
use chatflow_conversation::{
    AppEvent, FlowConfigUploaded, FlowId, LeadCreated, LeadReplied, LeadStatusChanged,
};
use chatflow_mediator::{Dispatcher, MediatorError};
use serde_json::json;
use std::sync::Arc;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<AppEvent>>,
    pub gateway: Arc<ChatGateway>,
}

/// Builds the ingress router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/flows/{flow_id}", post(upload_flow))
        .route("/webhooks/status", post(status_webhook))
        .route("/leads", post(create_lead))
        .route("/leads/reply", post(reply))
        .route("/messages", post(inbound_message))
        .route("/system/{event}", post(system_event))
        .with_state(state)
}

async fn version() -> impl IntoResponse {
    Json(json!({"version": env!("CARGO_PKG_VERSION")}))
}

async fn upload_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let upload = FlowConfigUploaded {
        flow: FlowId::new(flow_id),
        config: body,
    };
    state
        .dispatcher
        .dispatch(FLOW_CONFIG_UPLOADED, upload.into())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn status_webhook(
    State(state): State<AppState>,
    Json(event): Json<LeadStatusChanged>,
) -> Result<StatusCode, ApiError> {
    state
        .dispatcher
        .dispatch(LEAD_STATUS_CHANGED, event.into())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn create_lead(
    State(state): State<AppState>,
    Json(event): Json<LeadCreated>,
) -> Result<StatusCode, ApiError> {
    state.dispatcher.dispatch(LEAD_CREATED, event.into()).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn reply(
    State(state): State<AppState>,
    Json(event): Json<LeadReplied>,
) -> Result<StatusCode, ApiError> {
    state.dispatcher.dispatch(LEAD_REPLIED, event.into()).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn inbound_message(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let routed = state.gateway.route(message).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({"event": routed}))))
}

async fn system_event(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> Result<StatusCode, ApiError> {
    let name = SYSTEM_EVENTS
        .into_iter()
        .find(|name| name.as_str() == event)
        .ok_or(ApiError::UnknownSystemEvent)?;
    state.dispatcher.dispatch(name, AppEvent::System).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Ingress errors.
#[derive(Debug)]
pub enum ApiError {
    UnknownSystemEvent,
    Dispatch(MediatorError),
}

impl From<MediatorError> for ApiError {
    fn from(e: MediatorError) -> Self {
        Self::Dispatch(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::UnknownSystemEvent => (StatusCode::NOT_FOUND, "Unknown system event"),
            Self::Dispatch(e) => {
                tracing::error!(error = %e, "dispatch failed");
                (StatusCode::SERVICE_UNAVAILABLE, "Event could not be accepted")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::LogMessenger;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chatflow_conversation::event::{APP_EXIT, FLOW_EVENTS};
    use chatflow_mediator::{DispatcherConfig, EventName, Listener};
    use std::time::Duration;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
    use tower::ServiceExt;

    struct Forward(UnboundedSender<(EventName, AppEvent)>);

    #[async_trait]
    impl Listener<AppEvent> for Forward {
        async fn listen(&self, name: EventName, payload: AppEvent) {
            let _ = self.0.send((name, payload));
        }
    }

    fn published_events() -> Vec<EventName> {
        FLOW_EVENTS.into_iter().chain(SYSTEM_EVENTS).collect()
    }

    fn app() -> (Router, UnboundedReceiver<(EventName, AppEvent)>) {
        let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig::default()));
        let (tx, rx) = unbounded_channel();
        dispatcher
            .register(Arc::new(Forward(tx)), published_events())
            .unwrap();
        let gateway = Arc::new(ChatGateway::new(
            Arc::new(LogMessenger::new()),
            Arc::clone(&dispatcher),
        ));
        (router(AppState { dispatcher, gateway }), rx)
    }

    async fn received(rx: &mut UnboundedReceiver<(EventName, AppEvent)>) -> (EventName, AppEvent) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivered")
            .expect("open")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn version_reports_package_version() {
        let (app, _rx) = app();
        let response = app
            .oneshot(Request::get("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn flow_upload_publishes_raw_body() {
        let (app, mut rx) = app();
        let response = app
            .oneshot(post_json("/flows/35175244", r#"{"0": {}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let (name, payload) = received(&mut rx).await;
        assert_eq!(name, FLOW_CONFIG_UPLOADED);
        assert_eq!(
            payload,
            AppEvent::from(FlowConfigUploaded {
                flow: FlowId::new("35175244"),
                config: r#"{"0": {}}"#.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn status_webhook_publishes_entries() {
        let (app, mut rx) = app();
        let response = app
            .oneshot(post_json(
                "/webhooks/status",
                r#"{"status": [{"id": 3, "pipeline_id": 99}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let (name, payload) = received(&mut rx).await;
        assert_eq!(name, LEAD_STATUS_CHANGED);
        let AppEvent::LeadStatusChanged(event) = payload else {
            panic!("expected status change, got {payload:?}");
        };
        assert_eq!(event.statuses[0].external_id, 3);
        assert_eq!(event.statuses[0].flow, FlowId::new("99"));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (app, _rx) = app();
        let response = app
            .oneshot(post_json("/leads", r#"{"source": "no user"}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn inbound_message_reports_routed_event() {
        let (app, mut rx) = app();
        let response = app
            .oneshot(post_json(
                "/messages",
                r#"{"user": {"id": 8, "username": "bo"}, "text": "/start ad"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let (name, _) = received(&mut rx).await;
        assert_eq!(name, LEAD_CREATED);
    }

    #[tokio::test]
    async fn system_events_are_checked() {
        let (app, mut rx) = app();
        let response = app
            .clone()
            .oneshot(
                Request::post("/system/app.exit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(received(&mut rx).await, (APP_EXIT, AppEvent::System));

        let response = app
            .oneshot(Request::post("/system/reboot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unbound_event_is_unavailable() {
        let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig::default()));
        let gateway = Arc::new(ChatGateway::new(
            Arc::new(LogMessenger::new()),
            Arc::clone(&dispatcher),
        ));
        let app = router(AppState {
            dispatcher,
            gateway,
        });

        let response = app
            .oneshot(post_json("/leads/reply", r#"{"user": {"id": 1}, "message": "hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
