//! Parsing of free-form classifier output.
//!
//! Model replies are untrusted text: they may be bare JSON, JSON wrapped in a
//! markdown code fence, or prose. The batch pipeline only accepts replies that
//! parse as a JSON object; the per-article path falls back to splitting text.

use std::collections::BTreeMap;

use serde_json::Value;

/// Title to tags, as returned for one batch.
pub type ClassificationResult = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationParse {
    Parsed(ClassificationResult),
    Unparsed { raw: String },
}

pub fn parse_classification(text: &str) -> ClassificationParse {
    if let Some(result) = parse_object(text.trim()) {
        return ClassificationParse::Parsed(result);
    }

    tracing::debug!("classification is not plain JSON; retrying without code fences");
    if let Some(result) = parse_object(&strip_code_fences(text)) {
        return ClassificationParse::Parsed(result);
    }

    ClassificationParse::Unparsed {
        raw: text.to_owned(),
    }
}

/// Parses a JSON array of tags, falling back to [`fallback_tags`].
pub fn parse_tag_list(text: &str) -> Vec<String> {
    for candidate in [text.trim().to_owned(), strip_code_fences(text)] {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&candidate) {
            return items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(clean_tag)
                .collect();
        }
    }
    fallback_tags(text)
}

/// Best-effort extraction of tags from non-JSON text: fences, brackets and
/// quotes are dropped and the rest is split on commas and newlines.
pub fn fallback_tags(text: &str) -> Vec<String> {
    strip_code_fences(text)
        .replace(['[', ']', '"'], "")
        .split([',', '\n'])
        .filter_map(clean_tag)
        .collect()
}

pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_owned()
}

fn parse_object(text: &str) -> Option<ClassificationResult> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    let mut result = ClassificationResult::new();
    for (title, value) in object {
        let tags = match value {
            Value::String(tag) => clean_tag(tag).into_iter().collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(clean_tag)
                .collect(),
            _ => Vec::new(),
        };
        if !tags.is_empty() {
            result.insert(title.clone(), tags);
        }
    }
    Some(result)
}

fn clean_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    (!tag.is_empty()).then(|| tag.to_owned())
}
