//! Target management REST API.
//!
//! The caller is identified by the `x-user-id` header; requests without it
//! act as the configured default owner.

use crate::server::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use hub_coordinator::StorageError;
use serde::{Deserialize, Serialize};
use shared_types::{CheckStatus, MonitoredTarget, Observation, TargetId, Validator};
use tracing::{info, warn};

/// Header carrying the caller's account id
pub const USER_HEADER: &str = "x-user-id";

/// API routes, mounted under `/api/v1`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/website",
            post(create_website).delete(delete_website),
        )
        .route("/websites", get(list_websites))
        .route("/website/status", get(website_status))
        .route("/validators", get(list_validators))
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Website not found".to_string()),
            ApiError::Storage(e) => {
                warn!(error = %e, "API request failed in storage");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn owner(state: &AppState, headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.api.default_owner.clone())
}

/// Accept only absolute http(s) URLs with a host.
fn validate_url(url: &str) -> Result<(), ApiError> {
    let uri: Uri = url
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid url: {}", url)))?;
    match (uri.scheme_str(), uri.host()) {
        (Some("http" | "https"), Some(host)) if !host.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(format!(
            "Url must be absolute http or https: {}",
            url
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWebsite {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedWebsite {
    pub id: TargetId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteRef {
    pub website_id: TargetId,
}

/// One observation as shown to the target owner
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub status: CheckStatus,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Observation> for Tick {
    fn from(o: Observation) -> Self {
        Self {
            status: o.status,
            latency_ms: o.latency_ms,
            created_at: o.observed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteView {
    pub id: TargetId,
    pub url: String,
    pub ticks: Vec<Tick>,
}

async fn view(state: &AppState, target: MonitoredTarget) -> Result<WebsiteView, ApiError> {
    let ticks = state
        .catalog
        .recent_observations(target.id, state.api.recent_ticks)
        .await?;
    Ok(WebsiteView {
        id: target.id,
        url: target.url,
        ticks: ticks.into_iter().map(Tick::from).collect(),
    })
}

async fn create_website(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateWebsite>,
) -> Result<Json<CreatedWebsite>, ApiError> {
    validate_url(&body.url)?;
    let owner_id = owner(&state, &headers);
    let target = state.catalog.create_target(body.url.trim(), &owner_id).await?;
    info!(target_id = %target.id, url = %target.url, owner_id = %owner_id, "Website registered");
    Ok(Json(CreatedWebsite { id: target.id }))
}

async fn list_websites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<WebsiteView>>, ApiError> {
    let owner_id = owner(&state, &headers);
    let targets = state.catalog.list_targets_for_owner(&owner_id).await?;
    let mut views = Vec::with_capacity(targets.len());
    for target in targets {
        views.push(view(&state, target).await?);
    }
    Ok(Json(views))
}

async fn website_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WebsiteRef>,
) -> Result<Json<WebsiteView>, ApiError> {
    let owner_id = owner(&state, &headers);
    let target = state
        .catalog
        .get_target(query.website_id)
        .await?
        .filter(|t| t.owner_id == owner_id && !t.disabled)
        .ok_or(ApiError::NotFound)?;
    Ok(Json(view(&state, target).await?))
}

async fn delete_website(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WebsiteRef>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner_id = owner(&state, &headers);
    state
        .catalog
        .disable_target(body.website_id, &owner_id)
        .await?;
    info!(target_id = %body.website_id, owner_id = %owner_id, "Website disabled");
    Ok(Json(
        serde_json::json!({ "message": "Deleted website successfully" }),
    ))
}

async fn list_validators(
    State(state): State<AppState>,
) -> Result<Json<Vec<Validator>>, ApiError> {
    Ok(Json(state.catalog.list_validators().await?))
}
