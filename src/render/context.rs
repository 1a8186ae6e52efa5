//! Template context for a page

use tera::{Context, Value};

use crate::config::SiteMetadata;
use crate::content::Page;
use crate::data::GlobalData;

/// Build the context a page body and its layouts are rendered with.
///
/// Later inserts win: `site`, then global data, then the page's own data,
/// then `page` and `collections`.
pub fn page_context(
    site: &SiteMetadata,
    global: &GlobalData,
    page: &Page,
    collections: &Value,
) -> Context {
    let mut ctx = Context::new();
    ctx.insert("site", site);

    for (key, value) in global.entries() {
        ctx.insert(key.as_str(), value);
    }

    match serde_json::to_value(&page.data) {
        Ok(Value::Object(map)) => {
            for (key, value) in map {
                ctx.insert(key, &value);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(
            "Front-matter of {} is not representable in templates: {}",
            page.relative_path,
            e
        ),
    }

    ctx.insert("page", &page.info());
    ctx.insert("collections", collections);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateFormat;
    use crate::content::FrontMatter;
    use chrono::Local;
    use std::path::PathBuf;

    #[test]
    fn test_page_data_overrides_global() {
        let (data, _) =
            FrontMatter::parse("---\ntitle: Post\nmetadata: local\ntags: [a]\n---\n").unwrap();
        let page = Page {
            input_path: PathBuf::from("src/post.md"),
            relative_path: "post.md".to_string(),
            file_slug: "post".to_string(),
            format: TemplateFormat::Md,
            data,
            date: Local::now(),
            url: Some("/post/".to_string()),
            output_path: None,
            body: String::new(),
            content: String::new(),
            excerpt: None,
        };

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("metadata.json"), r#"{"name": "global"}"#).unwrap();
        let global = GlobalData::load(dir.path()).unwrap();

        let ctx = page_context(
            &SiteMetadata::default(),
            &global,
            &page,
            &Value::Object(Default::default()),
        );
        let json = ctx.into_json();
        assert_eq!(json["metadata"], "local");
        assert_eq!(json["title"], "Post");
        assert_eq!(json["tags"][0], "a");
        assert_eq!(json["page"]["url"], "/post/");
        assert_eq!(json["page"]["fileSlug"], "post");
        assert_eq!(json["site"]["title"], "My Blog");
    }
}
