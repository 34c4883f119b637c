use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::error::ApiError;
use super::state::AppState;
use crate::cache::Section;
use crate::fruits::FruitFilter;
use crate::ws::{ConnectionState, ReconnectingConnection};

type ApiResult = Result<Json<Value>, ApiError>;

pub async fn root() -> Json<Value> {
    Json(json!({ "status": 200 }))
}

pub async fn all(State(state): State<AppState>) -> ApiResult {
    let snapshot = state.cache.read().ok_or(ApiError::AllUnavailable)?;
    let data = snapshot.data().ok_or(ApiError::AllUnavailable)?;

    Ok(Json(json!({ "status": 200, "data": data })))
}

fn section(state: &AppState, section: Section) -> ApiResult {
    let unavailable = ApiError::SectionUnavailable(section);
    let snapshot = state.cache.read().ok_or(unavailable)?;
    let value = snapshot.section(section).ok_or(unavailable)?;

    let mut body = Map::new();
    body.insert("status".to_owned(), json!(200));
    body.insert(section.key().to_owned(), value.clone());

    Ok(Json(Value::Object(body)))
}

pub async fn seeds(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Seeds)
}

pub async fn gear(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Gear)
}

pub async fn eggs(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Eggs)
}

pub async fn cosmetics(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Cosmetics)
}

pub async fn events(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Events)
}

pub async fn weather(State(state): State<AppState>) -> ApiResult {
    section(&state, Section::Weather)
}

pub async fn fruits(
    State(state): State<AppState>,
    Query(filter): Query<FruitFilter>,
) -> ApiResult {
    let fruits = state
        .fruits
        .query(&filter)
        .ok_or(ApiError::FruitsUnavailable)?;

    Ok(Json(json!({ "status": 200, "fruits": fruits })))
}

/// Health of the upstream feed as seen by this process.
#[non_exhaustive]
#[derive(Debug, Serialize)]
pub struct FeedStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub retries: u32,
    pub attempts: u32,
    pub last_update: Option<chrono::DateTime<Utc>>,
    pub since_last_update_ms: Option<i64>,
    pub updates: u64,
}

impl FeedStatus {
    fn collect(state: &AppState) -> Self {
        let connection_state = state
            .connection
            .as_ref()
            .map_or(ConnectionState::Closed, ReconnectingConnection::state);
        let last_update = state.cache.last_updated();

        Self {
            state: connection_state,
            connected: connection_state.is_open(),
            retries: state
                .connection
                .as_ref()
                .map_or(0, ReconnectingConnection::retries),
            attempts: state
                .connection
                .as_ref()
                .map_or(0, ReconnectingConnection::attempts),
            last_update,
            since_last_update_ms: last_update.map(|at| (Utc::now() - at).num_milliseconds()),
            updates: state.cache.update_count(),
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": 200, "feed": FeedStatus::collect(&state) }))
}
