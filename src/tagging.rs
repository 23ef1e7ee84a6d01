use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::app::tag_store::TagStore;
use crate::classify::{ClassificationParse, ClassificationResult, parse_classification};
use crate::corpus::{self, CorpusRow};
use crate::formats::{BuildSummary, TagIndex, TaggedArticle};
use crate::gemini::TextGenerator;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_TAG_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct TagBuilderConfig {
    pub corpus_dir: PathBuf,
    pub model: String,
    pub batch_size: usize,
    /// Pause between consecutive classifier calls.
    pub batch_delay: Duration,
}

impl TagBuilderConfig {
    pub fn new(corpus_dir: impl Into<PathBuf>) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            model: DEFAULT_TAG_MODEL.to_owned(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// Builds the tag index from the corpus by classifying titles in batches.
pub struct TagBuilder {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn TagStore>,
    config: TagBuilderConfig,
}

impl TagBuilder {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn TagStore>,
        config: TagBuilderConfig,
    ) -> Self {
        Self {
            generator,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    pub fn config(&self) -> &TagBuilderConfig {
        &self.config
    }

    pub async fn build(&self) -> anyhow::Result<(TagIndex, BuildSummary)> {
        tracing::info!(
            dir = %self.config.corpus_dir.display(),
            model = %self.config.model,
            "building tag cache"
        );

        let rows = corpus::scan(self.config.corpus_dir.clone(), String::new())
            .await
            .context("scan corpus")?;
        let articles = rows
            .into_iter()
            .filter(CorpusRow::is_taggable)
            .collect::<Vec<_>>();

        let batch_size = self.config.batch_size.max(1);
        let batches = articles.len().div_ceil(batch_size);
        let mut index = TagIndex::default();
        let mut failed_batches = 0usize;

        for (i, batch) in articles.chunks(batch_size).enumerate() {
            tracing::info!(
                batch = i + 1,
                batches,
                titles = batch.len(),
                "classifying batch"
            );

            match self.classify_batch(batch).await {
                Ok(result) => {
                    let merged = merge_batch(&mut index, batch, &result);
                    tracing::debug!(batch = i + 1, merged, "merged batch tags");
                }
                Err(err) => {
                    failed_batches += 1;
                    tracing::warn!(
                        batch = i + 1,
                        error = %format!("{err:#}"),
                        "batch failed; skipping"
                    );
                }
            }

            if i + 1 < batches && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        self.store.write(&index).await.context("write tag cache")?;

        let summary = BuildSummary {
            rows: articles.len(),
            batches,
            failed_batches,
            tags: index.len(),
        };
        tracing::info!(
            rows = summary.rows,
            batches = summary.batches,
            failed_batches = summary.failed_batches,
            tags = summary.tags,
            "tag cache built"
        );
        Ok((index, summary))
    }

    async fn classify_batch(&self, batch: &[CorpusRow]) -> anyhow::Result<ClassificationResult> {
        let prompt = batch_prompt(batch.iter().map(|row| row.title.as_str()));
        let text = self
            .generator
            .generate(&self.config.model, &prompt)
            .await
            .context("call classifier")?;

        match parse_classification(&text) {
            ClassificationParse::Parsed(result) => Ok(result),
            ClassificationParse::Unparsed { raw } => {
                let sample = raw.chars().take(120).collect::<String>();
                anyhow::bail!("classifier reply is not a JSON object: {sample:?}")
            }
        }
    }
}

pub fn batch_prompt<'a>(titles: impl IntoIterator<Item = &'a str>) -> String {
    let titles = titles.into_iter().collect::<Vec<_>>().join("\n");
    format!(
        "Generate 2-3 short descriptive tags for each of the following article titles.\n\
Return ONLY valid JSON mapping each title, exactly as written, to an array of tags.\n\
\n\
Example:\n\
{{\n\
  \"AI in Healthcare\": [\"AI\", \"Healthcare\"],\n\
  \"Cancer Genomics\": [\"Cancer\", \"Genomics\"]\n\
}}\n\
\n\
Titles:\n\
{titles}\n"
    )
}

/// Appends each batch row under every tag the classifier gave its title,
/// walking the batch in corpus order. A title repeated within the batch is
/// credited to its first row only; titles the classifier invented are
/// ignored. Returns the number of (tag, article) pairs added.
pub fn merge_batch(
    index: &mut TagIndex,
    batch: &[CorpusRow],
    result: &ClassificationResult,
) -> usize {
    let mut seen = HashSet::new();
    let mut merged = 0usize;
    for row in batch {
        if !seen.insert(row.title.as_str()) {
            continue;
        }
        let Some(tags) = result.get(&row.title) else {
            tracing::debug!(title = %row.title, "classifier returned no tags for title");
            continue;
        };
        for tag in tags {
            index.push(
                tag,
                TaggedArticle {
                    title: row.title.clone(),
                    url: row.link.clone(),
                },
            );
            merged += 1;
        }
    }
    merged
}
