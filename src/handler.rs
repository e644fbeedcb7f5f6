use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::provider::{ChatMessage, Completion, Provider};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    BadRequest(String),
    #[error("An error occurred with the AI provider: {0}")]
    Provider(String),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ChatError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    history: Option<Value>,
    provider: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Clone)]
pub struct AppState {
    system_prompt: Arc<str>,
    openai: Arc<dyn Completion>,
    google: Arc<dyn Completion>,
}

impl AppState {
    pub fn new(
        system_prompt: String,
        openai: Arc<dyn Completion>,
        google: Arc<dyn Completion>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            openai,
            google,
        }
    }

    fn completion(&self, provider: Provider) -> &dyn Completion {
        match provider {
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Google => self.google.as_ref(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat).fallback(method_not_allowed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn method_not_allowed() -> ChatError {
    ChatError::MethodNotAllowed
}

/// `null`, `false`, `0` and `""` count as absent.
fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn malformed(err: serde_json::Error) -> ChatError {
    ChatError::BadRequest(format!("Malformed request body: {err}"))
}

fn validate(body: &[u8]) -> Result<(Provider, Vec<ChatMessage>), ChatError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(malformed)?;

    let (Some(history), Some(provider)) = (present(request.history), present(request.provider))
    else {
        return Err(ChatError::BadRequest(
            "Missing history or provider in request body".to_owned(),
        ));
    };

    let provider = provider
        .as_str()
        .and_then(|name| Provider::from_str(name).ok())
        .ok_or_else(|| ChatError::BadRequest("Invalid provider specified".to_owned()))?;

    let history: Vec<ChatMessage> = serde_json::from_value(history).map_err(malformed)?;
    if history.is_empty() {
        return Err(ChatError::BadRequest(
            "History must contain at least one message".to_owned(),
        ));
    }

    Ok((provider, history))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatReply>, ChatError> {
    let (provider, history) = validate(&body)?;

    info!(%provider, turns = history.len(), "Relaying chat");

    let reply = state
        .completion(provider)
        .complete(&state.system_prompt, &history)
        .await
        .map_err(|err| {
            error!(%provider, "API Error: {err:#}");
            ChatError::Provider(format!("{err:#}"))
        })?;

    Ok(Json(ChatReply { reply }))
}
