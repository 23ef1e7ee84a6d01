use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::model::{
    ChatRequest, ErrorBody, GenerateTagsRequest, GenerateTagsResponse, HighlightResponse,
    LinksResponse, PmcQuery, RebuildResponse, ReplyResponse, SearchQuery, TextRequest, required,
};
use crate::app::runner::{RefreshRunner, RefreshTrigger};
use crate::articles::{self, ArticleTagger};
use crate::assistant;
use crate::corpus;
use crate::formats::TagIndex;
use crate::gemini::TextGenerator;
use crate::pubs::{self, PmcIdError};

#[derive(Clone)]
pub struct AppState {
    pub corpus_dir: PathBuf,
    pub runner: Arc<RefreshRunner>,
    pub generator: Arc<dyn TextGenerator>,
    pub tagger: ArticleTagger,
    pub http: reqwest::Client,
    pub chat_model: String,
    /// Model for the short simplify/highlight prompts.
    pub fast_model: String,
    pub pmc_base_url: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/articles/tags", get(get_tags))
        .route("/api/articles/rebuild-tags", post(rebuild_tags))
        .route("/api/articles/generate-tags", post(generate_tags))
        .route("/api/search/links", get(search_links))
        .route("/api/gemini/chat", post(chat))
        .route("/api/gemini/simplify", post(simplify))
        .route("/api/highlight", post(highlight))
        .route("/api/pubs/get-xml", get(get_pmc_xml))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// `message` goes to the client; `source` is only logged.
    Internal {
        message: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn internal(message: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Internal { message, source }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal { message, source } => {
                tracing::error!(?source, "{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

async fn get_tags(State(state): State<AppState>) -> Result<Json<TagIndex>, ApiError> {
    let index = state
        .runner
        .read_or_build()
        .await
        .map_err(ApiError::internal("Failed to build or read tag map"))?;
    Ok(Json(index))
}

async fn rebuild_tags(State(state): State<AppState>) -> Result<Json<RebuildResponse>, ApiError> {
    let (tags, _) = state
        .runner
        .rebuild(RefreshTrigger::Manual)
        .await
        .map_err(ApiError::internal("Failed to rebuild tag cache"))?;
    Ok(Json(RebuildResponse {
        message: "Tag cache refreshed".to_owned(),
        tags,
    }))
}

async fn generate_tags(
    State(state): State<AppState>,
    body: Result<Json<GenerateTagsRequest>, JsonRejection>,
) -> Result<Json<GenerateTagsResponse>, ApiError> {
    let Json(req) = body?;
    let query = required(req.query.as_deref())
        .ok_or_else(|| ApiError::bad_request("Query is required"))?;
    let limit = req.limit.unwrap_or(articles::DEFAULT_LIMIT);

    let rows = corpus::scan(state.corpus_dir.clone(), query.to_owned())
        .await
        .map_err(ApiError::internal("Failed to generate tags"))?;
    if limit == 0 || !rows.iter().any(corpus::CorpusRow::is_taggable) {
        return Err(ApiError::NotFound("No matching articles found".to_owned()));
    }

    let results = state.tagger.tag_rows(&rows, limit).await;
    Ok(Json(GenerateTagsResponse {
        count: results.len(),
        results,
    }))
}

async fn search_links(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<LinksResponse>, ApiError> {
    let Query(q) = query?;
    let query = required(q.query.as_deref())
        .ok_or_else(|| ApiError::bad_request("Query is required"))?
        .to_owned();

    let rows = corpus::scan(state.corpus_dir.clone(), query.clone())
        .await
        .map_err(ApiError::internal("Failed to search CSV files"))?;
    Ok(Json(LinksResponse {
        query,
        links: corpus::unique_links(&rows),
    }))
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let Json(req) = body?;
    let message = required(req.message.as_deref())
        .ok_or_else(|| ApiError::bad_request("Message is required"))?;

    let reply = state
        .generator
        .generate(&state.chat_model, message)
        .await
        .map_err(|err| ApiError::internal("Failed to generate response")(err.into()))?;
    Ok(Json(ReplyResponse {
        reply: assistant::format_reply(&reply),
    }))
}

async fn simplify(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let Json(req) = body?;
    let text =
        required(req.text.as_deref()).ok_or_else(|| ApiError::bad_request("Text is required"))?;

    let reply = state
        .generator
        .generate(&state.fast_model, &assistant::simplify_prompt(text))
        .await
        .map_err(|err| ApiError::internal("Failed to process request")(err.into()))?;
    Ok(Json(ReplyResponse {
        reply: assistant::format_reply(&reply),
    }))
}

async fn highlight(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<HighlightResponse>, ApiError> {
    let Json(req) = body?;
    let text =
        required(req.text.as_deref()).ok_or_else(|| ApiError::bad_request("No text provided"))?;

    let result = state
        .generator
        .generate(&state.fast_model, &assistant::highlight_prompt(text))
        .await
        .map_err(|err| ApiError::internal("Server error")(err.into()))?;
    Ok(Json(HighlightResponse { result }))
}

async fn get_pmc_xml(
    State(state): State<AppState>,
    query: Result<Query<PmcQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query?;
    let pmc_id = pubs::validate_pmc_id(q.pmc_id.as_deref().unwrap_or_default())
        .map_err(|err: PmcIdError| ApiError::bad_request(err.to_string()))?;

    let xml = pubs::fetch_bioc_xml(&state.http, &state.pmc_base_url, pmc_id)
        .await
        .map_err(ApiError::internal("Error fetching XML"))?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}
