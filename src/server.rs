use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{EditError, EditResult};
use crate::orchestrator::Orchestrator;
use crate::types::{EditRequest, EditResponse};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Routes for the editor frontend. CORS is open because the editor is served
/// from a different origin during development.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/edit-with-ai", post(edit_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(cors)
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")
}

async fn edit_handler(
    State(state): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> EditResult<Json<EditResponse>> {
    let Json(request) =
        payload.map_err(|rejection| EditError::InvalidRequest(rejection.body_text()))?;
    let (element_html, user_prompt) = validate(&request)?;
    tracing::info!(
        html_chars = element_html.len(),
        prompt = user_prompt,
        "POST /api/edit-with-ai"
    );

    let modified_html = state
        .orchestrator
        .run(element_html, user_prompt, request.element_css.as_ref())
        .await?;

    Ok(Json(EditResponse { modified_html }))
}

fn validate(request: &EditRequest) -> EditResult<(&str, &str)> {
    let element_html = required(request.element_html.as_deref(), "elementHtml")?;
    let user_prompt = required(request.user_prompt.as_deref(), "userPrompt")?;
    Ok((element_html, user_prompt))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> EditResult<&'a str> {
    match value {
        None => Err(EditError::InvalidRequest(format!("{} is required", field))),
        Some(v) if v.trim().is_empty() => Err(EditError::InvalidRequest(format!(
            "{} must not be empty",
            field
        ))),
        Some(v) => Ok(v),
    }
}
