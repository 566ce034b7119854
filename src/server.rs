use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    error::error_chain,
    options::ScanOptions,
    progress::{ScanPhase, ScanProgress},
    scanner::Scanner,
    types::{CandidateSet, ScanReport, StatusCodeSet},
    wordlist,
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
}

impl AppState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState::default())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct ServerState {
    // Bumped on every accepted scan; only the newest scan may write back.
    generation: u64,
    status: Status,
    results: Option<ScanReport>,
    progress: Option<ScanProgress>,
    cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Status {
    pub total: u64,
    pub issued: u64,
    pub found: u64,
    pub state: ScanPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub url: String,
    pub words: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub status_codes: Vec<u16>,
    #[serde(default)]
    pub options: Option<ScanOptions>,
}

/// Routes under `/api`: start a scan, poll its status, fetch the report.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/results", get(get_results))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str) -> Result<()> {
    let app = router(AppState::new());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "control API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    let out = match s.progress.as_ref() {
        Some(p) => Status {
            total: p.total(),
            issued: p.issued(),
            found: p.found(),
            state: p.phase(),
            error: None,
        },
        None => s.status.clone(),
    };
    (StatusCode::OK, Json(out))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(res) = s.results.as_ref() {
        (StatusCode::OK, Json(res.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    // Request words go through the same comment/dedup rules as wordlist files.
    let words = wordlist::parse_words_str(&req.words.join("\n"));
    let extensions = wordlist::parse_words_str(&req.extensions.join("\n"));
    let status_codes: StatusCodeSet = if req.status_codes.is_empty() {
        wordlist::default_status_codes()
    } else {
        req.status_codes.into_iter().collect()
    };
    let mut options = req.options.unwrap_or_default();
    // No terminal to draw on.
    options.show_progress = false;

    let candidates = CandidateSet::new(words, extensions);
    let total = candidates.len() as u64;
    let scanner = match Scanner::new(options, candidates, status_codes) {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, error_chain(&e)).into_response(),
    };

    let progress = ScanProgress::new();
    let cancel = CancellationToken::new();

    let generation = {
        let mut s = app.inner.write().await;
        // Cancel any existing scan
        if let Some(c) = s.cancel.take() {
            c.cancel();
        }
        s.generation += 1;
        s.status = Status {
            total,
            state: ScanPhase::Setup,
            ..Default::default()
        };
        s.results = None;
        s.progress = Some(progress.clone());
        s.cancel = Some(cancel.clone());
        s.generation
    };

    let app2 = app.clone();
    let url = req.url;
    tokio::spawn(async move {
        let res = scanner
            .scan_with_progress(&url, progress.clone(), cancel.clone())
            .await;

        let mut s = app2.inner.write().await;
        // A newer scan has taken over; leave its state alone.
        if s.generation != generation {
            return;
        }
        s.progress = None;
        s.cancel = None;
        match res {
            Ok(report) => {
                s.status = Status {
                    total: report.words_total,
                    issued: report.words_issued,
                    found: report.results.len() as u64,
                    state: ScanPhase::Completed,
                    error: None,
                };
                s.results = Some(report);
                progress.set_phase(ScanPhase::Completed);
            }
            Err(e) => {
                let message = error_chain(&e);
                error!(url = %url, error = %message, "scan failed");
                s.status.state = ScanPhase::Aborted;
                s.status.error = Some(message);
            }
        }
    });

    let accepted = Status {
        total,
        state: ScanPhase::Setup,
        ..Default::default()
    };
    (StatusCode::ACCEPTED, Json(accepted)).into_response()
}
