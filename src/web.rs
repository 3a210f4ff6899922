use crate::{
    config::Config,
    errors::ExplorerError,
    projection::{Method, NeighborhoodPoint, ProjectedPoint, ProjectionEngine},
    similarity::{ModelComparison, SimilarityEngine},
    store::{ModelInfo, ModelStore, SimilarWord, Variant},
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

pub struct SharedState {
    pub config: Config,
    pub store: Arc<ModelStore>,
    pub similarity: SimilarityEngine,
    pub projection: ProjectionEngine,
}

impl SharedState {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(ModelStore::new(config.models_dir.clone().into()));
        let similarity = SimilarityEngine::new(store.clone());
        let projection = ProjectionEngine::new(store.clone(), config.projection.clone());

        Self {
            config,
            store,
            similarity,
            projection,
        }
    }
}

async fn start_app(config: Config) {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(SharedState::new(config));

    let available = state.store.preload();
    log::info!("{}/{} model variants available", available, Variant::ALL.len());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub fn build_router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/models", get(list_models))
        .route("/api/models/:variant", get(model_detail))
        .route("/api/models/:variant/vocabulary", get(vocabulary_sample))
        .route("/api/models/:variant/check-word", get(check_word))
        .route("/api/similarity/word/:word", get(similar_words))
        .route("/api/similarity/compare/:word", get(compare_models))
        .route("/api/embeddings/:variant", get(embeddings))
        .route(
            "/api/embeddings/:variant/neighborhood/:word",
            get(neighborhood),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

pub fn start_daemon(config: Config) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(config).await });
}

// Make our own error that wraps `ExplorerError`.
#[derive(Debug)]
struct HttpError(ExplorerError);

// Tell axum how to convert `ExplorerError` into a response. Payloads name
// the offending word/variant/parameter but never internal paths.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            ExplorerError::UnknownVariant(_)
            | ExplorerError::ArtifactNotFound(_)
            | ExplorerError::WordNotFound { .. } => (
                axum::http::StatusCode::NOT_FOUND,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            ExplorerError::InvalidParameter { .. } | ExplorerError::InsufficientPoints(_) => (
                axum::http::StatusCode::BAD_REQUEST,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            ExplorerError::ArtifactCorrupt { .. } => {
                log::error!("{self:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
            ExplorerError::IO(_) | ExplorerError::Other(_) => {
                log::error!("{self:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "internal error"}).to_string(),
                )
            }
        }
        .into_response()
    }
}

// This enables using `?` on functions that return `Result<_, ExplorerError>`
// to turn them into `Result<_, HttpError>`.
impl<E> From<E> for HttpError
where
    E: Into<ExplorerError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health() -> axum::Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn list_models(State(state): State<Arc<SharedState>>) -> axum::Json<Vec<ModelInfo>> {
    tokio::task::block_in_place(move || Json(state.store.all_model_info()))
}

async fn model_detail(
    State(state): State<Arc<SharedState>>,
    Path(variant): Path<String>,
) -> Result<axum::Json<ModelInfo>, HttpError> {
    let variant: Variant = variant.parse()?;
    tokio::task::block_in_place(move || Ok(Json(state.store.model_info(variant))))
}

#[derive(Debug, Deserialize)]
struct VocabularyParams {
    sample_size: Option<usize>,
}

#[derive(Serialize)]
struct VocabularyResponse {
    variant: Variant,
    vocab_size: usize,
    sample_words: Vec<String>,
}

async fn vocabulary_sample(
    State(state): State<Arc<SharedState>>,
    Path(variant): Path<String>,
    Query(params): Query<VocabularyParams>,
) -> Result<axum::Json<VocabularyResponse>, HttpError> {
    let variant: Variant = variant.parse()?;
    let sample_size = params.sample_size.unwrap_or(50);

    tokio::task::block_in_place(move || {
        let table = state.store.get(variant)?;
        let sample_words = state.similarity.vocabulary_sample(variant, sample_size)?;

        Ok(Json(VocabularyResponse {
            variant,
            vocab_size: table.len(),
            sample_words,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct CheckWordParams {
    word: String,
}

#[derive(Serialize)]
struct CheckWordResponse {
    word: String,
    variant: Variant,
    in_vocabulary: bool,
}

async fn check_word(
    State(state): State<Arc<SharedState>>,
    Path(variant): Path<String>,
    Query(params): Query<CheckWordParams>,
) -> Result<axum::Json<CheckWordResponse>, HttpError> {
    let variant: Variant = variant.parse()?;

    tokio::task::block_in_place(move || {
        let in_vocabulary = state.similarity.check_word(variant, &params.word)?;

        Ok(Json(CheckWordResponse {
            word: SimilarityEngine::normalize(&params.word),
            variant,
            in_vocabulary,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct SimilarityParams {
    variant: Option<String>,
    k: Option<usize>,
}

#[derive(Serialize)]
struct SimilarityResponse {
    query_word: String,
    variant: Variant,
    similar_words: Vec<SimilarWord>,
}

async fn similar_words(
    State(state): State<Arc<SharedState>>,
    Path(word): Path<String>,
    Query(params): Query<SimilarityParams>,
) -> Result<axum::Json<SimilarityResponse>, HttpError> {
    log::debug!("params: {params:?}");

    let variant: Variant = params.variant.as_deref().unwrap_or("tfidf").parse()?;
    let k = resolve_k(&state.config, params.k)?;

    tokio::task::block_in_place(move || {
        let similar_words = state.similarity.top_similar(variant, &word, k)?;

        Ok(Json(SimilarityResponse {
            query_word: SimilarityEngine::normalize(&word),
            variant,
            similar_words,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct CompareParams {
    k: Option<usize>,
}

#[derive(Serialize)]
struct CompareResponse {
    query_word: String,
    results: Vec<ModelComparison>,
}

async fn compare_models(
    State(state): State<Arc<SharedState>>,
    Path(word): Path<String>,
    Query(params): Query<CompareParams>,
) -> Result<axum::Json<CompareResponse>, HttpError> {
    log::debug!("params: {params:?}");

    let k = resolve_k(&state.config, params.k)?;

    tokio::task::block_in_place(move || {
        let results = state.similarity.compare(&word, k)?;

        Ok(Json(CompareResponse {
            query_word: SimilarityEngine::normalize(&word),
            results,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct EmbeddingsParams {
    method: Option<String>,
    #[serde(alias = "maxPoints")]
    max_points: Option<usize>,
}

#[derive(Serialize)]
struct EmbeddingsResponse {
    variant: Variant,
    method: Method,
    num_words: usize,
    points: Vec<ProjectedPoint>,
}

async fn embeddings(
    State(state): State<Arc<SharedState>>,
    Path(variant): Path<String>,
    Query(params): Query<EmbeddingsParams>,
) -> Result<axum::Json<EmbeddingsResponse>, HttpError> {
    log::debug!("params: {params:?}");

    let variant: Variant = variant.parse()?;
    let method = resolve_method(&state.config, params.method.as_deref())?;
    let max_points = params
        .max_points
        .unwrap_or(state.config.projection.default_max_points);

    tokio::task::block_in_place(move || {
        let points = state.projection.project(variant, method, max_points)?;

        Ok(Json(EmbeddingsResponse {
            variant,
            method,
            num_words: points.len(),
            points,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct NeighborhoodParams {
    method: Option<String>,
    neighbors: Option<usize>,
}

#[derive(Serialize)]
struct NeighborhoodResponse {
    query_word: String,
    variant: Variant,
    method: Method,
    points: Vec<NeighborhoodPoint>,
}

async fn neighborhood(
    State(state): State<Arc<SharedState>>,
    Path((variant, word)): Path<(String, String)>,
    Query(params): Query<NeighborhoodParams>,
) -> Result<axum::Json<NeighborhoodResponse>, HttpError> {
    log::debug!("params: {params:?}");

    let variant: Variant = variant.parse()?;
    let method = resolve_method(&state.config, params.method.as_deref())?;
    let neighbors = resolve_k(&state.config, params.neighbors)?;

    tokio::task::block_in_place(move || {
        let points =
            state
                .projection
                .neighborhood(&state.similarity, variant, &word, method, neighbors)?;

        Ok(Json(NeighborhoodResponse {
            query_word: SimilarityEngine::normalize(&word),
            variant,
            method,
            points,
        }))
    })
}

fn resolve_k(config: &Config, k: Option<usize>) -> Result<usize, ExplorerError> {
    let k = k.unwrap_or(config.similarity.default_k);

    if k == 0 {
        return Err(ExplorerError::invalid_parameter(
            "k",
            "must be a positive integer",
        ));
    }
    if k > config.similarity.max_k {
        return Err(ExplorerError::invalid_parameter(
            "k",
            format!("must not exceed {}", config.similarity.max_k),
        ));
    }

    Ok(k)
}

fn resolve_method(config: &Config, method: Option<&str>) -> Result<Method, ExplorerError> {
    method
        .unwrap_or(config.projection.default_method.as_str())
        .parse()
}
