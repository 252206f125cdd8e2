use crate::{
    app::{AppError, FreshnessReport, NotesApp, PersistMode},
    semantic::{EmbeddingProvider, SearchResponse, SemanticSearchError},
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

struct SharedState<P> {
    app: NotesApp<P>,
}

pub fn router<P: EmbeddingProvider + 'static>(app: NotesApp<P>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/api/notes/search", post(search::<P>))
        .route("/api/notes/status", post(status::<P>))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app<P: EmbeddingProvider + 'static>(
    app: NotesApp<P>,
    addr: &str,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon<P: EmbeddingProvider + 'static>(
    app: NotesApp<P>,
    addr: &str,
) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(app, addr))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::Search(SemanticSearchError::InvalidQuery) | AppError::InvalidOptions(_) => {
                axum::http::StatusCode::BAD_REQUEST
            }
            AppError::Search(SemanticSearchError::Embedding(_)) | AppError::Embedding(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::BAD_GATEWAY
            }
            _ => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, json!({"error": self.0.to_string()}).to_string()).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchNotesRequest {
    pub query: String,
    pub folder_id: Option<String>,

    /// Minimum similarity [0.0, 1.0]
    ///
    /// *Configured `default_threshold` when omitted*
    pub min_similarity: Option<f32>,
    pub max_results: Option<usize>,

    /// Re-embed stale notes before ranking.
    ///
    /// *Enabled by default*
    pub regenerate_stale: Option<bool>,
}

async fn search<P: EmbeddingProvider + 'static>(
    State(state): State<Arc<SharedState<P>>>,
    Json(payload): Json<SearchNotesRequest>,
) -> Result<Json<SearchResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    let options = state.app.options_with(
        payload.min_similarity,
        payload.max_results,
        payload.regenerate_stale,
    )?;

    let response = state
        .app
        .search(
            &payload.query,
            payload.folder_id.as_deref(),
            options,
            PersistMode::Detach,
        )
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRequest {
    pub folder_id: Option<String>,
}

async fn status<P: EmbeddingProvider + 'static>(
    State(state): State<Arc<SharedState<P>>>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Vec<FreshnessReport>>, HttpError> {
    let app = state.app.clone();

    let reports = tokio::task::spawn_blocking(move || app.status(payload.folder_id.as_deref()))
        .await
        .map_err(|e| AppError::Store(anyhow::anyhow!("status task failed: {e}")))??;

    Ok(Json(reports))
}
