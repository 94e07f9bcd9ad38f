use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{error, info};

use chatlink_common::ACCEPTED_EVENT;

use crate::coordinator::{RequestCoordinator, RequestError};
use crate::notifier::ChannelRegistry;
use crate::store::AccountStore;

pub type Result<T> = std::result::Result<T, AppError>;

pub struct AppError(anyhow::Error);

// Status comes from the coordinator's error kind; anything else is a 500.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<RequestError>() {
            Some(RequestError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Some(RequestError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(RequestError::Conflict(_)) => StatusCode::CONFLICT,
            Some(RequestError::Store(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
            return (status, format!("Something went wrong: {}", self.0)).into_response();
        }
        (status, self.0.to_string()).into_response()
    }
}

// This enables using `?` on anything convertible to `anyhow::Error`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Clone)]
pub struct State {
    coordinator: RequestCoordinator,
    registry: Arc<ChannelRegistry>,
}

impl State {
    pub fn new(store: Arc<dyn AccountStore>, registry: Arc<ChannelRegistry>) -> Self {
        Self {
            coordinator: RequestCoordinator::new(store, registry.clone()),
            registry,
        }
    }
}

pub fn router(state: State) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/add-account", post(add_account))
        .route("/:account_id/private/get/profile", get(client_server::get_profile))
        .route("/:account_id/private/get/received-chat-requests", get(client_server::get_received_chat_requests))
        .route("/:account_id/private/get/accepted-chat-requests", get(client_server::get_accepted_chat_requests))
        .route("/:account_id/private/get/events", get(client_server::get_events))
        .route("/:account_id/private/post/send-chat-request", post(client_server::post_send_chat_request))
        .route("/:account_id/private/post/accept-chat-request", post(client_server::post_accept_chat_request))
        .layer(Extension(state))
}

async fn root() -> &'static str {
    "chatlink"
}

async fn add_account(
    Extension(state): Extension<State>,
    Json(payload): Json<chatlink_common::NewAccount>,
) -> Result<impl IntoResponse> {
    let account = state.coordinator.register(&payload.name, &payload.email).await?;
    Ok(Json(account))
}

mod client_server {
    use super::*;
    use chatlink_common::{AcceptChatRequest, AcceptedChatRequest, AccountId, Ack, SendChatRequest};

    pub async fn get_profile(Extension(state): Extension<State>, Path(account_id): Path<String>) -> Result<impl IntoResponse> {
        Ok(Json(state.coordinator.profile(&AccountId(account_id)).await?))
    }
    pub async fn get_received_chat_requests(Extension(state): Extension<State>, Path(account_id): Path<String>) -> Result<impl IntoResponse> {
        Ok(Json(state.coordinator.list_received(&AccountId(account_id)).await?))
    }
    pub async fn get_accepted_chat_requests(Extension(state): Extension<State>, Path(account_id): Path<String>) -> Result<impl IntoResponse> {
        Ok(Json(state.coordinator.list_accepted_sent_by_user(&AccountId(account_id)).await?))
    }
    pub async fn post_send_chat_request(
        Extension(state): Extension<State>,
        Path(account_id): Path<String>,
        Json(payload): Json<SendChatRequest>,
    ) -> Result<impl IntoResponse> {
        state
            .coordinator
            .send(&AccountId(account_id), &payload.recipient_email)
            .await?;
        Ok(Json(Ack { message: String::from("Chat request sent") }))
    }
    pub async fn post_accept_chat_request(
        Extension(state): Extension<State>,
        Path(account_id): Path<String>,
        Json(payload): Json<AcceptChatRequest>,
    ) -> Result<impl IntoResponse> {
        let received_chat_requests = state
            .coordinator
            .accept(&AccountId(account_id), &payload.sender_email)
            .await?;
        Ok(Json(AcceptedChatRequest {
            message: String::from("Chat request accepted"),
            received_chat_requests,
        }))
    }

    /// Joins the account's live channel and streams acceptance events as SSE.
    pub async fn get_events(
        Extension(state): Extension<State>,
        Path(account_id): Path<String>,
    ) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
        let account = state.coordinator.profile(&AccountId(account_id)).await?;
        let rx = state.registry.join(&account.id);
        info!(account = %account.id, "joined event channel");

        let events = BroadcastStream::new(rx).filter_map(|result| match result {
            Ok(event) => Event::default().event(ACCEPTED_EVENT).json_data(&event).ok().map(Ok),
            Err(_) => None, // lagged
        });
        Ok(Sse::new(events).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        ))
    }
}
