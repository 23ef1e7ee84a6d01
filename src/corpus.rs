use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

/// One record of the article corpus. The first column is the title and the
/// second column is the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusRow {
    pub file: String,
    pub title: String,
    pub link: String,
    pub values: Vec<String>,
}

impl CorpusRow {
    pub fn is_taggable(&self) -> bool {
        !self.title.is_empty() && is_http_url(&self.link)
    }
}

pub fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Lower-cases `input` and keeps only ASCII letters and digits.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Returns every row across the `.csv` files in `dir` that has a field
/// containing `query` after normalization. An empty query matches all rows.
pub fn search(dir: &Path, query: &str) -> anyhow::Result<Vec<CorpusRow>> {
    let needle = normalize(query);

    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read corpus dir: {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("read corpus dir entry: {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        files.push(path);
    }
    files.sort();

    let mut rows = Vec::new();
    for path in &files {
        read_csv_file(path, &needle, &mut rows)?;
    }

    tracing::debug!(
        dir = %dir.display(),
        files = files.len(),
        rows = rows.len(),
        query,
        "corpus scan"
    );
    Ok(rows)
}

pub async fn scan(dir: PathBuf, query: String) -> anyhow::Result<Vec<CorpusRow>> {
    tokio::task::spawn_blocking(move || search(&dir, &query))
        .await
        .context("join corpus scan task")?
}

/// Links of the taggable rows, first occurrence wins.
pub fn unique_links(rows: &[CorpusRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| row.is_taggable())
        .filter(|row| seen.insert(row.link.as_str()))
        .map(|row| row.link.clone())
        .collect()
}

fn read_csv_file(path: &Path, needle: &str, out: &mut Vec<CorpusRow>) -> anyhow::Result<()> {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open csv: {}", path.display()))?;

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(file = %file, row = idx + 1, %err, "skipping malformed csv row");
                continue;
            }
        };

        let values = record.iter().map(str::to_owned).collect::<Vec<_>>();
        let title = values.first().cloned().unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        if !needle.is_empty() && !values.iter().any(|v| normalize(v).contains(needle)) {
            continue;
        }

        out.push(CorpusRow {
            file: file.clone(),
            link: values.get(1).cloned().unwrap_or_default(),
            title,
            values,
        });
    }

    Ok(())
}
