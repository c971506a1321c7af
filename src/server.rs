//! HTTP interface to the extraction & ranking pipeline.

use crate::authors::is_safe_identifier;
use crate::config::Config;
use crate::error::ScholarMailError;
use crate::extract::TextExtractor;
use crate::pipeline::{build_report, EmailReport};
use crate::similarity::{find_closest_email, ClosestEmail};
use crate::stats::{email_statistics, EmailCount};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared server state.
pub struct AppState {
    pub config: Config,
    pub extractor: Box<dyn TextExtractor>,
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rank", post(rank_handler))
        .route("/authors/{identifier}/emails", get(author_emails_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Rank request body
#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub emails: Vec<String>,
    pub name: String,
}

/// Rank response
#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub most_frequent: Option<EmailCount>,
    pub ranked: Vec<EmailCount>,
    pub closest: ClosestEmail,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, e: impl std::fmt::Display) -> ApiError {
    (status, Json(ErrorBody { error: e.to_string() }))
}

/// Rank an email list supplied by the caller
async fn rank_handler(Json(req): Json<RankRequest>) -> Result<Json<RankResponse>, ApiError> {
    info!(emails = req.emails.len(), name = %req.name, "Rank request");

    let closest = find_closest_email(&req.emails, &req.name).map_err(|e| match e {
        ScholarMailError::EmptyInput | ScholarMailError::EmptyVocabulary => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, e)
        }
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other),
    })?;
    let (most_frequent, ranked) = email_statistics(&req.emails);

    Ok(Json(RankResponse {
        most_frequent,
        ranked,
        closest,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// Build the report for an author directory on disk
async fn author_emails_handler(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Query(query): Query<NameQuery>,
) -> Result<Json<EmailReport>, ApiError> {
    info!(identifier = %identifier, name = %query.name, "Author emails request");

    if !is_safe_identifier(&identifier) {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid identifier"));
    }
    if !state.config.author_dir(&identifier).is_dir() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no documents for {}", identifier),
        ));
    }

    build_report(
        &state.config.download_root,
        &identifier,
        &query.name,
        state.extractor.as_ref(),
    )
    .await
    .map(Json)
    .map_err(|e| {
        error!(identifier = %identifier, error = %e, "Report failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })
}
