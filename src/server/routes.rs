use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::ApiState;
use crate::conversation::trim_history;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/api/chat", post(chat).get(chat_health))
        .route("/api/markets", get(markets))
        .route("/", get(index))
        .route("/health", get(health))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/chat
async fn chat(State(state): State<ApiState>, payload: Result<Json<Value>, JsonRejection>) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "rejected chat request body");
            Value::Null
        }
    };

    let Some(question) = body
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "Question is required and must be a string");
    };
    let history = history_from(body.get("conversationHistory"));

    let preview: String = question.chars().take(100).collect();
    info!(question = %preview, history = history.len(), "processing question");

    match state.chatbot.ask(question, &history).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(error = %e, "chat request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// String entries of `conversationHistory`, most recent twenty.
fn history_from(value: Option<&Value>) -> Vec<String> {
    let mut history: Vec<String> = value
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    trim_history(&mut history);
    history
}

/// GET /api/chat
async fn chat_health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({ "status": "ok", "health": state.chatbot.health() }))
}

/// GET /api/markets
async fn markets(State(state): State<ApiState>) -> Response {
    match state.chatbot.live_markets().await {
        Ok(markets) => Json(json!({
            "markets": markets,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "market snapshot failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch market data")
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "OK"
}
