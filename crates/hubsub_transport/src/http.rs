//! Management API handlers.
//!
//! Thin synchronous facade over the broker: topic administration plus the
//! health and stats snapshots. Broker errors map onto conventional status
//! codes; the broker itself never fails fatally.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use hubsub_broker::engine::{Health, TopicStats};
use hubsub_broker::error::BrokerError;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TopicChanged {
    pub status: &'static str,
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct TopicEntry {
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct TopicsResponse {
    pub topics: HashMap<String, TopicEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub topics: HashMap<String, TopicStats>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        let status = match err {
            BrokerError::TopicExists => StatusCode::CONFLICT,
            BrokerError::TopicNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

pub async fn create_topic(
    State(state): State<AppState>,
    body: Result<Json<CreateTopicRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TopicChanged>), ApiError> {
    let Json(req) = body.map_err(|_| ApiError::bad_request("Invalid JSON"))?;
    if req.name.is_empty() {
        return Err(ApiError::bad_request("Topic name is required"));
    }
    let topic = state.broker.create_topic(&req.name)?;
    Ok((
        StatusCode::CREATED,
        Json(TopicChanged {
            status: "created",
            topic: topic.name.clone(),
        }),
    ))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TopicChanged>, ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Topic name is required"));
    }
    state.broker.delete_topic(&name).await?;
    Ok(Json(TopicChanged {
        status: "deleted",
        topic: name,
    }))
}

pub async fn list_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    let topics = state
        .broker
        .list()
        .into_iter()
        .map(|(name, subscribers)| (name, TopicEntry { subscribers }))
        .collect();
    Json(TopicsResponse { topics })
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.broker.health())
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        topics: state.broker.stats(),
    })
}
