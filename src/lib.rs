//! kiln: a static site generator for a personal blog
//!
//! Reads Markdown, Nunjucks, Liquid and HTML content with YAML front-matter,
//! wraps it in layouts rendered with Tera, and writes a static output tree
//! alongside minified CSS and passthrough-copied assets.

pub mod collections;
pub mod commands;
pub mod config;
pub mod content;
pub mod data;
pub mod error;
pub mod filters;
pub mod generator;
pub mod passthrough;
pub mod render;
pub mod server;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use error::BuildError;
pub use generator::BuildReport;

/// Name of the configuration file in the project directory
pub const CONFIG_FILE: &str = "kiln.yml";

/// A blog project on disk
#[derive(Debug, Clone)]
pub struct Site {
    /// Build configuration
    pub config: config::BuildConfig,
    /// Project directory
    pub base_dir: PathBuf,
    /// Content root
    pub input_dir: PathBuf,
    /// Layouts and partials
    pub includes_dir: PathBuf,
    /// Global data files
    pub data_dir: PathBuf,
    /// Output root
    pub output_dir: PathBuf,
    /// Whether pages marked `draft: true` are built
    pub include_drafts: bool,
}

impl Site {
    /// Open a project directory, reading `kiln.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::BuildConfig::load(&config_path)?
        } else {
            tracing::debug!("No {} in {:?}, using defaults", CONFIG_FILE, base_dir);
            config::BuildConfig::default()
        };

        Ok(Self::from_config(base_dir, config))
    }

    /// Create a site from an already loaded configuration
    pub fn from_config<P: AsRef<Path>>(base_dir: P, config: config::BuildConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let input_dir = join_dir(&base_dir, &config.dir.input);
        let includes_dir = join_dir(&input_dir, &config.dir.includes);
        let data_dir = join_dir(&input_dir, &config.dir.data);
        let output_dir = join_dir(&base_dir, &config.dir.output);

        Self {
            config,
            base_dir,
            input_dir,
            includes_dir,
            data_dir,
            output_dir,
            include_drafts: false,
        }
    }

    /// Build drafts too
    pub fn with_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    /// Write output somewhere other than `dir.output`
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.output_dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.base_dir.join(dir)
        };
        self
    }

    /// Override the deployment path prefix
    pub fn with_path_prefix(mut self, prefix: &str) -> Self {
        self.config.path_prefix = config::normalize_path_prefix(prefix);
        self
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }

    /// Build the static site
    pub fn build(&self) -> Result<BuildReport> {
        commands::build::run(self)
    }

    /// Remove the output directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, tags: &[String]) -> Result<PathBuf> {
        commands::new::create_post(self, title, tags)
    }
}

fn join_dir(base: &Path, dir: &str) -> PathBuf {
    let dir = dir.trim();
    if dir.is_empty() || dir == "." {
        base.to_path_buf()
    } else {
        base.join(dir.trim_start_matches("./"))
    }
}
