//! Content loader - walks the input directory and builds pages

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use super::{parse_front_matter_mapping, DateKeyword, FrontMatter, Page};
use crate::config::TemplateFormat;
use crate::data::{merge_data, DirectoryData};
use crate::error::BuildError;
use crate::passthrough;
use crate::Site;

/// Pages found in the input directory
#[derive(Debug, Default)]
pub struct LoadedContent {
    pub pages: Vec<Page>,
    pub drafts_skipped: usize,
}

/// Loads content from the input directory
pub struct ContentLoader<'a> {
    site: &'a Site,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Load every template file under the input directory
    pub fn load(&self) -> Result<LoadedContent> {
        let mut loaded = LoadedContent::default();
        if !self.site.input_dir.exists() {
            tracing::warn!("Input directory {:?} does not exist", self.site.input_dir);
            return Ok(loaded);
        }

        let mut directory_data = DirectoryData::new(&self.site.input_dir);

        for entry in WalkDir::new(&self.site.input_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(format) = TemplateFormat::from_path(path) else {
                continue;
            };
            if !self.site.config.accepts(format) {
                tracing::debug!("Skipping {:?}: format not enabled", path);
                continue;
            }
            let relative = self.relative_path(path);
            if passthrough::covers(&self.site.config.passthrough_copy, Path::new(&relative)) {
                continue;
            }

            let page = self.load_page(path, relative, format, &mut directory_data)?;
            if page.data.draft && !self.site.include_drafts {
                tracing::debug!("Skipping draft {:?}", path);
                loaded.drafts_skipped += 1;
                continue;
            }
            loaded.pages.push(page);
        }

        Ok(loaded)
    }

    /// Load a single page from a file
    fn load_page(
        &self,
        path: &Path,
        relative_path: String,
        format: TemplateFormat,
        directory_data: &mut DirectoryData,
    ) -> Result<Page> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let (own, body) =
            parse_front_matter_mapping(&content).map_err(|source| BuildError::FrontMatter {
                path: path.to_path_buf(),
                source,
            })?;

        let mut merged = directory_data.for_file(path)?;
        merge_data(&mut merged, own);
        let data = FrontMatter::from_mapping(merged).map_err(|source| BuildError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;

        let (date_prefix, stem) = split_date_prefix(file_stem(path));
        let file_slug = if stem == "index" {
            Path::new(&relative_path)
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string()
        } else {
            stem.to_string()
        };

        let date = resolve_date(path, &data, date_prefix)?;

        Ok(Page {
            input_path: path.to_path_buf(),
            relative_path,
            file_slug,
            format,
            data,
            date,
            url: None,
            output_path: None,
            body: body.to_string(),
            content: String::new(),
            excerpt: None,
        })
    }

    /// Directories that never hold content
    fn is_ignored(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let path = entry.path();
        if path.starts_with(&self.site.includes_dir)
            || path.starts_with(&self.site.data_dir)
            || path.starts_with(&self.site.output_dir)
        {
            return true;
        }
        entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.') || name == "node_modules")
            .unwrap_or(false)
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.site.input_dir).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled")
}

/// Split a leading `YYYY-MM-DD-` from a file stem
pub(crate) fn split_date_prefix(stem: &str) -> (Option<NaiveDate>, &str) {
    if stem.len() > 11 && stem.is_char_boundary(10) && stem.as_bytes()[10] == b'-' {
        if let Ok(date) = NaiveDate::parse_from_str(&stem[..10], "%Y-%m-%d") {
            return (Some(date), &stem[11..]);
        }
    }
    (None, stem)
}

/// Front-matter date, then the filename prefix, then file timestamps
fn resolve_date(
    path: &Path,
    data: &FrontMatter,
    date_prefix: Option<NaiveDate>,
) -> Result<DateTime<Local>> {
    if let Some(date) = data.parse_date() {
        return Ok(date);
    }

    let keyword = data.date_keyword();
    if data.date.is_some() && keyword.is_none() {
        tracing::warn!(
            "Unrecognised date {:?} in {:?}, falling back",
            data.date,
            path
        );
    }

    if keyword.is_none() {
        if let Some(date) = date_prefix
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|d| Local.from_local_datetime(&d).earliest())
        {
            return Ok(date);
        }
    }

    let metadata = fs::metadata(path)?;
    let timestamp = match keyword {
        Some(DateKeyword::LastModified) => metadata.modified().ok(),
        _ => metadata.created().or_else(|_| metadata.modified()).ok(),
    };
    Ok(timestamp.map(DateTime::<Local>::from).unwrap_or_else(Local::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use tempfile::TempDir;

    fn site_in(dir: &Path, config: BuildConfig) -> Site {
        Site::from_config(dir, config)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_split_date_prefix() {
        let (date, stem) = split_date_prefix("2024-03-05-hello-world");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(stem, "hello-world");

        assert_eq!(split_date_prefix("hello"), (None, "hello"));
        assert_eq!(split_date_prefix("2024-13-05-x"), (None, "2024-13-05-x"));
    }

    #[test]
    fn test_load_pages() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(
            &src.join("posts/2023-06-01-first.md"),
            "---\ntitle: First\ntags: rust\n---\nHello",
        );
        write(&src.join("posts/posts.json"), r#"{"tags": "posts", "layout": "post.njk"}"#);
        write(&src.join("index.njk"), "Home");
        write(&src.join("_includes/base.njk"), "{{ content }}");
        write(&src.join("_data/site.json"), "{}");
        write(&src.join("assets/style.css"), "body {}");
        write(&src.join(".hidden/secret.md"), "nope");

        let site = site_in(dir.path(), BuildConfig::default());
        let loaded = ContentLoader::new(&site).load().unwrap();
        let paths: Vec<_> = loaded.pages.iter().map(|p| p.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["index.njk", "posts/2023-06-01-first.md"]);

        let post = &loaded.pages[1];
        assert_eq!(post.file_slug, "first");
        assert_eq!(post.format, TemplateFormat::Md);
        assert_eq!(post.data.tags, vec!["posts", "rust"]);
        assert_eq!(post.data.layout.as_deref(), Some("post.njk"));
        assert_eq!(post.date.format("%Y-%m-%d").to_string(), "2023-06-01");
        assert_eq!(post.body, "Hello");

        let index = &loaded.pages[0];
        assert_eq!(index.file_slug, "");
    }

    #[test]
    fn test_numeric_front_matter_values() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("404.md"), "---\ntitle: 404\ntags: [2024, rust]\n---\nLost");

        let site = site_in(dir.path(), BuildConfig::default());
        let pages = ContentLoader::new(&site).load().unwrap().pages;
        assert_eq!(pages[0].data.title.as_deref(), Some("404"));
        assert_eq!(pages[0].tags(), &["2024".to_string(), "rust".to_string()]);
    }

    #[test]
    fn test_drafts_skipped_unless_requested() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("wip.md"), "---\ntitle: WIP\ndraft: true\n---\nSoon");
        write(&src.join("done.md"), "---\ntitle: Done\n---\nNow");

        let site = site_in(dir.path(), BuildConfig::default());
        let loaded = ContentLoader::new(&site).load().unwrap();
        assert_eq!(loaded.pages.len(), 1);
        assert_eq!(loaded.drafts_skipped, 1);

        let site = site.with_drafts(true);
        let loaded = ContentLoader::new(&site).load().unwrap();
        assert_eq!(loaded.pages.len(), 2);
        assert_eq!(loaded.drafts_skipped, 0);
    }

    #[test]
    fn test_disabled_formats_and_passthrough_are_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.md"), "A");
        write(&src.join("b.liquid"), "B");
        write(&src.join("static/raw.html"), "<p>raw</p>");

        let mut config = BuildConfig::default();
        config.template_formats = vec![TemplateFormat::Md, TemplateFormat::Html];
        config.passthrough_copy = vec!["static".to_string()];
        let site = site_in(dir.path(), config);

        let loaded = ContentLoader::new(&site).load().unwrap();
        let paths: Vec<_> = loaded.pages.iter().map(|p| p.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md"]);
    }

    #[test]
    fn test_index_file_slug_uses_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("about/index.md"), "About");

        let site = site_in(dir.path(), BuildConfig::default());
        let loaded = ContentLoader::new(&site).load().unwrap();
        assert_eq!(loaded.pages[0].file_slug, "about");
    }

    #[test]
    fn test_bad_front_matter_names_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("broken.md"), "---\ntitle: [oops\ntags: a\n---\n");

        let site = site_in(dir.path(), BuildConfig::default());
        let err = ContentLoader::new(&site).load().unwrap_err();
        assert!(format!("{}", err).contains("broken.md"));
    }
}
