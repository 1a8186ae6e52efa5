//! Page model

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;

use super::FrontMatter;
use crate::config::TemplateFormat;

/// Marker separating a page's excerpt from the rest of its content
pub const EXCERPT_SEPARATOR: &str = "<!-- more -->";

/// A content file to be rendered
#[derive(Debug, Clone)]
pub struct Page {
    /// Full source file path
    pub input_path: PathBuf,

    /// Source path relative to the input directory, `/`-separated
    pub relative_path: String,

    /// File stem without a leading date prefix
    pub file_slug: String,

    /// Template format from the file extension
    pub format: TemplateFormat,

    /// Front-matter after the data cascade
    pub data: FrontMatter,

    /// Page date
    pub date: DateTime<Local>,

    /// URL path (without the path prefix), `None` when `permalink: false`
    pub url: Option<String>,

    /// Where the page is written, `None` when `permalink: false`
    pub output_path: Option<PathBuf>,

    /// Raw body after front-matter
    pub body: String,

    /// Rendered body, before layouts
    pub content: String,

    /// Rendered content before the excerpt separator
    pub excerpt: Option<String>,
}

impl Page {
    pub fn tags(&self) -> &[String] {
        &self.data.tags
    }

    pub fn is_tagged(&self) -> bool {
        !self.data.tags.is_empty()
    }

    /// Store rendered content and derive the excerpt from it
    pub fn set_content(&mut self, content: String) {
        self.excerpt = split_excerpt(&content).map(str::to_string);
        self.content = content;
    }

    /// The `page` variable seen by templates
    pub fn info(&self) -> PageInfo {
        PageInfo {
            url: self.url.clone().unwrap_or_default(),
            input_path: self.relative_path.clone(),
            file_slug: self.file_slug.clone(),
            date: self.date.to_rfc3339(),
            output_path: self
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// This page as an entry of a collection
    pub fn collection_item(&self, with_content: bool) -> CollectionItem {
        CollectionItem {
            url: self.url.clone().unwrap_or_default(),
            date: self.date.to_rfc3339(),
            input_path: self.relative_path.clone(),
            file_slug: self.file_slug.clone(),
            data: self.data.clone(),
            content: if with_content {
                self.content.clone()
            } else {
                String::new()
            },
            excerpt: if with_content {
                self.excerpt.clone()
            } else {
                None
            },
        }
    }
}

/// The `page` template variable
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: String,
    pub input_path: String,
    pub file_slug: String,
    pub date: String,
    pub output_path: String,
}

/// One entry of `collections.<name>`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub url: String,
    pub date: String,
    pub input_path: String,
    pub file_slug: String,
    pub data: FrontMatter,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Content before the excerpt separator, if the separator is present
pub fn split_excerpt(content: &str) -> Option<&str> {
    content
        .split_once(EXCERPT_SEPARATOR)
        .map(|(excerpt, _)| excerpt.trim())
}
