//! Tag collections

use serde::Serialize;
use std::collections::BTreeMap;

use crate::content::{CollectionItem, Page};

/// `collections.all` plus one collection per tag
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Collections {
    inner: BTreeMap<String, Vec<CollectionItem>>,
}

impl Collections {
    /// Build collections from pages, sorted by date then input path.
    ///
    /// With `with_content` false every item's `content` is empty.
    pub fn build(pages: &[Page], with_content: bool) -> Self {
        let mut members: Vec<&Page> = pages
            .iter()
            .filter(|p| !p.data.exclude_from_collections)
            .collect();
        members.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });

        let mut inner: BTreeMap<String, Vec<CollectionItem>> = BTreeMap::new();
        inner.insert("all".to_string(), Vec::new());
        for page in members {
            let item = page.collection_item(with_content);
            for tag in page.tags() {
                if tag == "all" {
                    continue;
                }
                inner.entry(tag.clone()).or_default().push(item.clone());
            }
            inner.entry("all".to_string()).or_default().push(item);
        }

        Self { inner }
    }

    pub fn get(&self, name: &str) -> Option<&[CollectionItem]> {
        self.inner.get(name).map(Vec::as_slice)
    }

    /// Tag names, excluding `all`
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str).filter(|k| *k != "all")
    }
}
