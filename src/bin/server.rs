use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use fabric_nester::error::RequestError;
use fabric_nester::rules::{PatternRuleLookup, RuleBook};
use fabric_nester::store::{MemoryStore, ResultStore};
use fabric_nester::wire::{self, PackRequest, PackResponse};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone)]
struct AppState {
    rules: Arc<RuleBook>,
    store: Arc<dyn ResultStore>,
}

#[derive(Deserialize)]
struct PatternQuery {
    sleeves: String,
    neckline: String,
    size: String,
}

#[derive(Serialize)]
struct PatternResponse {
    pattern: Vec<PieceView>,
    assets: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PieceView {
    piece_id: String,
    qty: u32,
    area: f64,
    rotations: Vec<f64>,
    points: Vec<[f64; 2]>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn pattern(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<PatternResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(found) = state
        .rules
        .lookup(&query.sleeves, &query.neckline, &query.size)
    else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Pattern data not found for size {}", query.size),
            }),
        ));
    };

    Ok(Json(PatternResponse {
        pattern: found
            .pieces
            .iter()
            .map(|p| PieceView {
                piece_id: p.id().to_string(),
                qty: p.quantity(),
                area: p.area(),
                rotations: p.rotations().to_vec(),
                points: p.outline().points().iter().map(|pt| [pt.x, pt.y]).collect(),
            })
            .collect(),
        assets: found.assets.clone(),
    }))
}

async fn pack(
    State(state): State<AppState>,
    Json(req): Json<PackRequest>,
) -> (StatusCode, Json<PackResponse>) {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /pack"
    );

    let rules = Arc::clone(&state.rules);
    let fabric_id = req.fabric_id.clone();
    let outcome = tokio::task::spawn_blocking(move || wire::handle(&req, rules.as_ref())).await;

    let (status, response) = match outcome {
        Ok(Ok(result)) => (StatusCode::OK, PackResponse::from(&result)),
        Ok(Err(err)) => {
            let status = match err {
                RequestError::PatternNotFound { .. } => StatusCode::NOT_FOUND,
                RequestError::Pack(_) => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, PackResponse::failure(&err))
        }
        Err(join_err) => {
            tracing::error!(error = %join_err, "packing task failed");
            let failed = PackResponse {
                ok: false,
                utilization: 0.0,
                placements: Vec::new(),
                unplaced: Vec::new(),
                error: Some("packing task failed".to_string()),
                stats: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, failed)
        }
    };

    if status == StatusCode::OK
        && let Some(id) = fabric_id
    {
        state.store.save(&id, response.clone());
    }
    (status, Json(response))
}

async fn result(
    State(state): State<AppState>,
    Path(fabric_id): Path<String>,
) -> Result<Json<PackResponse>, (StatusCode, Json<ErrorResponse>)> {
    state.store.load(&fabric_id).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no packing result for fabric {fabric_id}"),
            }),
        )
    })
}

fn load_rules() -> RuleBook {
    match std::env::var("PATTERN_RULES") {
        Ok(path) => match RuleBook::load(&path) {
            Ok(book) => {
                tracing::info!(path = %path, rules = book.len(), "pattern rules loaded");
                book
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "failed to load pattern rules");
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Err(_) => RuleBook::default(),
    }
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let state = AppState {
        rules: Arc::new(load_rules()),
        store: Arc::new(MemoryStore::new()),
    };

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/pattern", get(pattern))
        .route("/pack", post(pack))
        .route("/results/{fabric_id}", get(result))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.expect("server error");
}
