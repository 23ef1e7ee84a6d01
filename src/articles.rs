use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::classify::parse_tag_list;
use crate::corpus::CorpusRow;
use crate::formats::TaggedArticleResult;
use crate::gemini::TextGenerator;

pub const DEFAULT_LIMIT: usize = 5;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const CONTENT_CHARS: usize = 2000;
pub const ERROR_TAG: &str = "Error fetching or tagging";

/// Tags individual articles from their fetched content.
#[derive(Clone)]
pub struct ArticleTagger {
    client: reqwest::Client,
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl ArticleTagger {
    pub fn new(
        client: reqwest::Client,
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            generator,
            model: model.into(),
        }
    }

    /// Tags the first `limit` taggable rows one after another. A failure on
    /// one article is reported as a single error tag for that article.
    pub async fn tag_rows(&self, rows: &[CorpusRow], limit: usize) -> Vec<TaggedArticleResult> {
        let mut results = Vec::new();
        for row in rows.iter().filter(|row| row.is_taggable()).take(limit) {
            let tags = match self.tag_article(&row.title, &row.link).await {
                Ok(tags) => tags,
                Err(err) => {
                    tracing::warn!(
                        url = %row.link,
                        error = %format!("{err:#}"),
                        "article tagging failed"
                    );
                    vec![ERROR_TAG.to_owned()]
                }
            };
            results.push(TaggedArticleResult {
                title: row.title.clone(),
                url: row.link.clone(),
                tags,
            });
        }
        results
    }

    async fn tag_article(&self, title: &str, url: &str) -> anyhow::Result<Vec<String>> {
        let body = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .text()
            .await
            .with_context(|| format!("read body: {url}"))?;
        let content = body.chars().take(CONTENT_CHARS).collect::<String>();

        let reply = self
            .generator
            .generate(&self.model, &article_prompt(title, &content))
            .await
            .context("call tagger")?;
        Ok(parse_tag_list(&reply))
    }
}

pub fn article_prompt(title: &str, content: &str) -> String {
    format!(
        "You are a helpful content classifier.\n\
Read the following article and generate 3-7 short descriptive tags\n\
(like topics, fields, or keywords) that summarize its content.\n\
\n\
Title: \"{title}\"\n\
Content: \"\"\"{content}\"\"\"\n\
\n\
Respond ONLY in valid JSON array format. Example:\n\
[\"AI\", \"Healthcare\", \"Innovation\"]\n"
    )
}
