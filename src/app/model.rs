use serde::{Deserialize, Serialize};

use crate::formats::{TagIndex, TaggedArticleResult};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateTagsRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

/// Body of the simplify and highlight endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TextRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmcQuery {
    #[serde(rename = "pmcId")]
    pub pmc_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildResponse {
    pub message: String,
    pub tags: TagIndex,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateTagsResponse {
    pub count: usize,
    pub results: Vec<TaggedArticleResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinksResponse {
    pub query: String,
    pub links: Vec<String>,
}

/// Trimmed value of an optional request field, `None` when absent or blank.
pub fn required(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|v| !v.is_empty())
}
