//! Generator module - the single build pass from content to output tree

use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tera::Value;

use crate::collections::Collections;
use crate::content::loader::{split_date_prefix, ContentLoader};
use crate::content::{Page, Permalink};
use crate::data::GlobalData;
use crate::error::BuildError;
use crate::passthrough;
use crate::render::{page_context, Renderer};
use crate::Site;

/// What a build produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// HTML files written
    pub pages_written: usize,
    /// Pages rendered but not written (`permalink: false`)
    pub pages_unwritten: usize,
    /// Drafts left out of the build
    pub drafts_skipped: usize,
    /// Files copied by passthrough rules
    pub files_copied: usize,
}

/// Static site generator
pub struct Generator<'a> {
    site: &'a Site,
    renderer: Renderer,
    global: GlobalData,
}

impl<'a> Generator<'a> {
    /// Create a new generator
    pub fn new(site: &'a Site) -> Result<Self> {
        let renderer = Renderer::new(&site.config, &site.includes_dir)?;
        let global = GlobalData::load(&site.data_dir)?;

        Ok(Self {
            site,
            renderer,
            global,
        })
    }

    /// Generate the entire site
    pub fn generate(&mut self) -> Result<BuildReport> {
        let loaded = ContentLoader::new(self.site).load()?;
        let mut pages = loaded.pages;
        tracing::info!(
            "Loaded {} pages ({} drafts skipped)",
            pages.len(),
            loaded.drafts_skipped
        );

        fs::create_dir_all(&self.site.output_dir)
            .with_context(|| format!("Failed to create {:?}", self.site.output_dir))?;

        let files_copied = passthrough::copy_all(
            &self.site.config.passthrough_copy,
            &self.site.input_dir,
            &self.site.output_dir,
        )?;
        if files_copied > 0 {
            tracing::info!("Copied {} passthrough files", files_copied);
        }

        self.resolve_permalinks(&mut pages)?;

        // Tagged pages fill collections, so they render first and see
        // collections without content. Untagged pages (indexes, feeds)
        // render second and see every tagged page's content.
        let without_content = to_value(&Collections::build(&pages, false))?;
        self.render_bodies(&mut pages, true, &without_content)?;

        let with_tagged_content = to_value(&Collections::build(&pages, true))?;
        self.render_bodies(&mut pages, false, &with_tagged_content)?;

        let complete = to_value(&Collections::build(&pages, true))?;
        let mut report = BuildReport {
            drafts_skipped: loaded.drafts_skipped,
            files_copied,
            ..Default::default()
        };

        for page in &pages {
            let Some(output_path) = &page.output_path else {
                tracing::debug!("Not writing {} (permalink: false)", page.relative_path);
                report.pages_unwritten += 1;
                continue;
            };

            let mut ctx = page_context(&self.site.config.site, &self.global, page, &complete);
            let html = self
                .renderer
                .apply_layouts(page, page.content.clone(), &mut ctx)?;

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(output_path, html)
                .with_context(|| format!("Failed to write {:?}", output_path))?;
            tracing::debug!("Wrote {} -> {:?}", page.relative_path, output_path);
            report.pages_written += 1;
        }

        Ok(report)
    }

    fn render_bodies(&mut self, pages: &mut [Page], tagged: bool, collections: &Value) -> Result<()> {
        for page in pages.iter_mut().filter(|p| p.is_tagged() == tagged) {
            let ctx = page_context(&self.site.config.site, &self.global, page, collections);
            let html = self.renderer.render_body(page, &ctx)?;
            page.set_content(html);
        }
        Ok(())
    }

    /// Assign each page its URL and output path
    fn resolve_permalinks(&mut self, pages: &mut [Page]) -> Result<()> {
        let no_collections = Value::Object(Default::default());
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

        for page in pages.iter_mut() {
            let url = match &page.data.permalink {
                Some(Permalink::Disabled) => None,
                Some(Permalink::Path(template)) => {
                    let ctx =
                        page_context(&self.site.config.site, &self.global, page, &no_collections);
                    let rendered =
                        self.renderer
                            .render_string(template, &ctx, &page.relative_path)?;
                    Some(normalize_url(&rendered))
                }
                None => Some(default_url(&page.relative_path, &page.file_slug)),
            };

            page.output_path = url
                .as_deref()
                .map(|u| output_path_for(&self.site.output_dir, u));
            page.url = url;

            if let Some(output) = &page.output_path {
                if let Some(first) = claimed.insert(output.clone(), page.input_path.clone()) {
                    return Err(BuildError::DuplicateOutput {
                        output: output.clone(),
                        first,
                        second: page.input_path.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

fn to_value(collections: &Collections) -> Result<Value> {
    Ok(serde_json::to_value(collections)?)
}

/// URL for a page without a permalink: `a/b.md` -> `/a/b/`, `a/index.md` -> `/a/`
pub fn default_url(relative_path: &str, file_slug: &str) -> String {
    let path = Path::new(relative_path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let is_index = split_date_prefix(stem).1 == "index";

    let mut segments: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    if !is_index {
        segments.push(file_slug.to_string());
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// Leading slash, no surrounding whitespace
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Where a URL is written: directory URLs get `index.html`
pub fn output_path_for(output_dir: &Path, url: &str) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    for component in Path::new(url.trim_start_matches('/')).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    if url.ends_with('/') || url.is_empty() {
        path.push("index.html");
    }
    path
}
