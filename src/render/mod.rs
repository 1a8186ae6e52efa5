//! Template rendering: engine selection per file type and layout chains

mod context;

pub use context::page_context;

use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::config::{BuildConfig, TemplateEngine, TemplateFormat};
use crate::content::{parse_front_matter_mapping, FrontMatter, MarkdownRenderer, Page};
use crate::error::{BuildError, BuildResult};
use crate::filters;

/// Extensions tried when a layout is named without one
const LAYOUT_EXTENSIONS: [&str; 3] = ["njk", "liquid", "html"];

/// A template from the includes directory
#[derive(Debug, Clone)]
struct Layout {
    data: FrontMatter,
}

/// Renders page bodies and wraps them in layouts
pub struct Renderer {
    tera: Tera,
    layouts: HashMap<String, Layout>,
    markdown: MarkdownRenderer,
    markdown_engine: Option<TemplateEngine>,
    html_engine: Option<TemplateEngine>,
}

impl Renderer {
    /// Create a renderer with every file in `includes_dir` registered
    pub fn new(config: &BuildConfig, includes_dir: &Path) -> Result<Self> {
        let mut tera = Tera::default();

        // Output is HTML built from trusted content; escaping would mangle it
        tera.autoescape_on(vec![]);
        filters::register(&mut tera, config);

        let mut templates: Vec<(String, String)> = Vec::new();
        let mut layouts = HashMap::new();

        if includes_dir.exists() {
            for entry in WalkDir::new(includes_dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Ok(content) = fs::read_to_string(path) else {
                    tracing::debug!("Skipping non-text include {:?}", path);
                    continue;
                };

                let name = path
                    .strip_prefix(includes_dir)?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                let (map, body) =
                    parse_front_matter_mapping(&content).map_err(|source| {
                        BuildError::FrontMatter {
                            path: path.to_path_buf(),
                            source,
                        }
                    })?;
                let data = FrontMatter::from_mapping(map).map_err(|source| {
                    BuildError::FrontMatter {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;

                tracing::debug!("Registered include `{}`", name);
                templates.push((name.clone(), body.to_string()));
                layouts.insert(name, Layout { data });
            }
        }

        tera.add_raw_templates(templates)
            .map_err(|source| BuildError::Render {
                template: includes_dir.to_string_lossy().into_owned(),
                source,
            })
            .with_context(|| format!("Failed to load includes from {:?}", includes_dir))?;

        Ok(Self {
            tera,
            layouts,
            markdown: MarkdownRenderer::new(&config.highlight_theme),
            markdown_engine: config.markdown_template_engine,
            html_engine: config.html_template_engine,
        })
    }

    /// Render a template string with the registered filters and includes
    pub fn render_string(
        &mut self,
        source: &str,
        context: &Context,
        origin: &str,
    ) -> BuildResult<String> {
        self.tera
            .render_str(source, context)
            .map_err(|source| BuildError::Render {
                template: origin.to_string(),
                source,
            })
    }

    /// Render a page body according to its file type
    pub fn render_body(&mut self, page: &Page, context: &Context) -> BuildResult<String> {
        let origin = page.relative_path.as_str();
        match page.format {
            TemplateFormat::Njk | TemplateFormat::Liquid => {
                self.render_string(&page.body, context, origin)
            }
            TemplateFormat::Html => match self.html_engine {
                Some(engine) => {
                    tracing::trace!("Rendering {} with {}", origin, engine);
                    self.render_string(&page.body, context, origin)
                }
                None => Ok(page.body.clone()),
            },
            TemplateFormat::Md => {
                let source = match self.markdown_engine {
                    Some(engine) => {
                        tracing::trace!("Preprocessing {} with {}", origin, engine);
                        self.render_string(&page.body, context, origin)?
                    }
                    None => page.body.clone(),
                };
                Ok(self.markdown.render(&source))
            }
        }
    }

    /// Wrap rendered content in the page's layout chain
    pub fn apply_layouts(
        &self,
        page: &Page,
        content: String,
        context: &mut Context,
    ) -> BuildResult<String> {
        let mut content = content;
        let mut current = page.data.layout.clone();
        let mut referrer = page.relative_path.clone();
        let mut chain: Vec<String> = Vec::new();

        while let Some(name) = current {
            let resolved =
                self.resolve_layout(&name)
                    .ok_or_else(|| BuildError::LayoutNotFound {
                        name: name.clone(),
                        referrer: referrer.clone(),
                    })?;
            if chain.contains(&resolved) {
                chain.push(resolved);
                return Err(BuildError::LayoutCycle { chain });
            }
            chain.push(resolved.clone());

            let layout = &self.layouts[&resolved];
            insert_layout_data(context, &layout.data);
            context.insert("content", &content);

            content = self
                .tera
                .render(&resolved, context)
                .map_err(|source| BuildError::Render {
                    template: resolved.clone(),
                    source,
                })?;

            current = layout.data.layout.clone();
            referrer = resolved;
        }

        Ok(content)
    }

    /// Find a layout by exact name, or by name plus a template extension
    fn resolve_layout(&self, name: &str) -> Option<String> {
        let name = name.trim_start_matches("./").trim_start_matches('/');
        if self.layouts.contains_key(name) {
            return Some(name.to_string());
        }
        LAYOUT_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{}", name, ext))
            .find(|candidate| self.layouts.contains_key(candidate))
    }
}

/// Layout front-matter fills keys the page did not set
fn insert_layout_data(context: &mut Context, data: &FrontMatter) {
    let Ok(tera::Value::Object(map)) = serde_json::to_value(data) else {
        return;
    };
    for (key, value) in map {
        if key == "layout" || context.contains_key(&key) {
            continue;
        }
        context.insert(key, &value);
    }
}
