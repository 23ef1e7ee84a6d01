use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedArticle {
    pub title: String,
    pub url: String,
}

/// Tag name to the articles classified under it.
///
/// Serializes as `{ "<tag>": [{ "title": .., "url": .. }, ..] }` with keys in
/// sorted order. Deserialization also accepts the older flat layout where each
/// tag maps to alternating title/url strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, StoredEntries>")]
pub struct TagIndex {
    tags: BTreeMap<String, Vec<TaggedArticle>>,
}

impl TagIndex {
    pub fn push(&mut self, tag: &str, article: TaggedArticle) {
        self.tags.entry(tag.to_owned()).or_default().push(article);
    }

    pub fn get(&self, tag: &str) -> Option<&[TaggedArticle]> {
        self.tags.get(tag).map(Vec::as_slice)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TaggedArticle])> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Serialize for TagIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tags.serialize(serializer)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntries {
    Records(Vec<TaggedArticle>),
    Flat(Vec<String>),
}

impl From<BTreeMap<String, StoredEntries>> for TagIndex {
    fn from(stored: BTreeMap<String, StoredEntries>) -> Self {
        let tags = stored
            .into_iter()
            .map(|(tag, entries)| {
                let articles = match entries {
                    StoredEntries::Records(records) => records,
                    // Trailing unpaired title is dropped.
                    StoredEntries::Flat(flat) => flat
                        .chunks_exact(2)
                        .map(|pair| TaggedArticle {
                            title: pair[0].clone(),
                            url: pair[1].clone(),
                        })
                        .collect(),
                };
                (tag, articles)
            })
            .collect();
        Self { tags }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub rows: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub tags: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedArticleResult {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, url: &str) -> TaggedArticle {
        TaggedArticle {
            title: title.to_owned(),
            url: url.to_owned(),
        }
    }

    #[test]
    fn serializes_structured_records_with_sorted_keys() -> anyhow::Result<()> {
        let mut index = TagIndex::default();
        index.push("Space", article("Mars Rover", "https://example.com/mars"));
        index.push("Biology", article("Bone Loss", "https://example.com/bone"));

        let json = serde_json::to_string(&index)?;
        assert_eq!(
            json,
            r#"{"Biology":[{"title":"Bone Loss","url":"https://example.com/bone"}],"Space":[{"title":"Mars Rover","url":"https://example.com/mars"}]}"#
        );
        Ok(())
    }

    #[test]
    fn reads_legacy_flat_layout() -> anyhow::Result<()> {
        let legacy = r#"{
            "Space": ["Mars Rover", "https://example.com/mars", "Moon Dust", "https://example.com/moon"],
            "Odd": ["Only Title"]
        }"#;
        let index: TagIndex = serde_json::from_str(legacy)?;

        assert_eq!(
            index.get("Space").unwrap(),
            &[
                article("Mars Rover", "https://example.com/mars"),
                article("Moon Dust", "https://example.com/moon"),
            ]
        );
        assert_eq!(index.get("Odd").unwrap(), &[] as &[TaggedArticle]);
        Ok(())
    }

    #[test]
    fn push_keeps_duplicate_pairs() {
        let mut index = TagIndex::default();
        index.push("Space", article("Mars Rover", "https://example.com/mars"));
        index.push("Space", article("Mars Rover", "https://example.com/mars"));

        assert_eq!(index.get("Space").map(<[_]>::len), Some(2));
        assert_eq!(index.len(), 1);
    }
}
