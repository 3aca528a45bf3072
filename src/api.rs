use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::cloudflare::CloudflareApi;
use crate::config::Config;
use crate::updater::{self, UpdateRequest};

pub struct AppState {
    pub config: Config,
}

#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
    link: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Deserialize)]
struct UpdateQuery {
    key: Option<String>,
}

pub fn create_router(config: Config) -> Router {
    let state = Arc::new(AppState { config });

    Router::new()
        .route("/dnslink/{target}/{*link}", get(update_dnslink))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request info
    let method = request.method().clone();
    let uri = request.uri();
    let path = match uri.query() {
        Some(q) => format!("{}?{}", uri.path(), q),
        None => uri.path().to_string(),
    };
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    // Process request
    let response = next.run(request).await;

    // Extract response info
    let status = response.status().as_u16();
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn update_dnslink(
    State(state): State<Arc<AppState>>,
    Path((target_name, link)): Path<(String, String)>,
    Query(query): Query<UpdateQuery>,
) -> impl IntoResponse {
    // The wildcard segment loses its leading slash
    let link = format!("/{}", link);

    if !is_valid_link(&link) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: format!("Invalid link: {}", link),
            }),
        )
            .into_response();
    }

    // Find target config
    let target = match state.config.get_target(&target_name) {
        Some(target) => target,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    success: false,
                    error: format!("Target not found: {}", target_name),
                }),
            )
                .into_response();
        }
    };

    // Verify access key (if configured)
    if let Some(ref config_key) = target.key {
        let request_key = query.key.as_deref().unwrap_or("");
        if request_key != config_key {
            warn!("Invalid key for target: {}", target_name);
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    success: false,
                    error: "Invalid key".to_string(),
                }),
            )
                .into_response();
        }
    }

    let api = match &target.api_base {
        Some(base) => CloudflareApi::with_base_url(target.credentials.clone(), base.clone()),
        None => CloudflareApi::new(target.credentials.clone()),
    };
    let request = UpdateRequest {
        zone: target.zone.clone(),
        link,
        record: target.record().to_string(),
    };

    match updater::update(&api, target.mode, &request).await {
        Ok(link) => {
            info!("DNSLink update successful: {} -> {}", target.zone, link);
            (
                StatusCode::OK,
                Json(ApiResponse {
                    success: true,
                    message: format!("Updated {} to {}", target.zone, link),
                    link,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("DNSLink update failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: format!("DNSLink update failed: {}", e),
                }),
            )
                .into_response()
        }
    }
}

pub(crate) fn is_valid_link(link: &str) -> bool {
    link.strip_prefix("/ipfs/")
        .or_else(|| link.strip_prefix("/ipns/"))
        .is_some_and(|rest| !rest.is_empty())
}
