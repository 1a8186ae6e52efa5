//! Build configuration (kiln.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// File types the build treats as templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    Md,
    Njk,
    Html,
    Liquid,
}

impl TemplateFormat {
    pub const ALL: [TemplateFormat; 4] = [
        TemplateFormat::Md,
        TemplateFormat::Njk,
        TemplateFormat::Html,
        TemplateFormat::Liquid,
    ];

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Md => "md",
            TemplateFormat::Njk => "njk",
            TemplateFormat::Html => "html",
            TemplateFormat::Liquid => "liquid",
        }
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "md" | "markdown" => Some(TemplateFormat::Md),
            "njk" => Some(TemplateFormat::Njk),
            "html" | "htm" => Some(TemplateFormat::Html),
            "liquid" => Some(TemplateFormat::Liquid),
            _ => None,
        }
    }
}

/// Template engines that can render a file's body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    #[serde(rename = "njk")]
    Nunjucks,
    Liquid,
}

impl TemplateEngine {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "njk" | "nunjucks" => Some(TemplateEngine::Nunjucks),
            "liquid" => Some(TemplateEngine::Liquid),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateEngine::Nunjucks => f.write_str("njk"),
            TemplateEngine::Liquid => f.write_str("liquid"),
        }
    }
}

/// Accepts an engine name, or `false`/null to disable preprocessing
fn engine_or_false<'de, D>(deserializer: D) -> Result<Option<TemplateEngine>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct EngineOrFalse;

    impl<'de> Visitor<'de> for EngineOrFalse {
        type Value = Option<TemplateEngine>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a template engine name (njk, liquid) or false")
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value {
                Err(E::custom("`true` is not a template engine; use njk or liquid"))
            } else {
                Ok(None)
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            TemplateEngine::from_name(value)
                .map(Some)
                .ok_or_else(|| E::custom(format!("unknown template engine `{}`", value)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(EngineOrFalse)
}

/// Directory roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirConfig {
    /// Content root, relative to the project directory
    pub input: String,
    /// Layouts and partials, relative to `input`
    pub includes: String,
    /// Global data files, relative to `input`
    pub data: String,
    /// Output root, relative to the project directory
    pub output: String,
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            input: "src".to_string(),
            includes: "_includes".to_string(),
            data: "_data".to_string(),
            output: "_site".to_string(),
        }
    }
}

/// Site metadata exposed to templates as `site`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteMetadata {
    pub title: String,
    pub description: String,
    pub url: String,
    pub author: String,
    pub language: String,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            url: "http://example.com".to_string(),
            author: String::new(),
            language: "en".to_string(),
            extra: HashMap::new(),
        }
    }
}

/// Main build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub template_formats: Vec<TemplateFormat>,
    pub dir: DirConfig,
    pub path_prefix: String,
    #[serde(deserialize_with = "engine_or_false")]
    pub markdown_template_engine: Option<TemplateEngine>,
    #[serde(deserialize_with = "engine_or_false")]
    pub html_template_engine: Option<TemplateEngine>,
    pub passthrough_copy: Vec<String>,
    pub highlight_theme: String,
    pub site: SiteMetadata,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            template_formats: TemplateFormat::ALL.to_vec(),
            dir: DirConfig::default(),
            path_prefix: "/".to_string(),
            markdown_template_engine: Some(TemplateEngine::Nunjucks),
            html_template_engine: Some(TemplateEngine::Nunjucks),
            passthrough_copy: Vec::new(),
            highlight_theme: "base16-ocean.dark".to_string(),
            site: SiteMetadata::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid config {:?}", path))
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        // An empty file is a valid config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: BuildConfig = serde_yaml::from_str(content)?;
        config.path_prefix = normalize_path_prefix(&config.path_prefix);
        Ok(config)
    }

    /// Whether files of this format are processed
    pub fn accepts(&self, format: TemplateFormat) -> bool {
        self.template_formats.contains(&format)
    }
}

/// Ensure a path prefix starts and ends with `/`
pub fn normalize_path_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.dir.input, "src");
        assert_eq!(config.dir.includes, "_includes");
        assert_eq!(config.dir.data, "_data");
        assert_eq!(config.dir.output, "_site");
        assert_eq!(config.path_prefix, "/");
        assert_eq!(config.template_formats.len(), 4);
        assert_eq!(
            config.markdown_template_engine,
            Some(TemplateEngine::Nunjucks)
        );
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
template_formats: [md, njk]
dir:
  input: content
  output: dist
path_prefix: blog
markdown_template_engine: liquid
html_template_engine: false
passthrough_copy:
  - assets
  - "images/**/*.png"
site:
  title: Notes
  twitter: "@someone"
"#;
        let config = BuildConfig::parse(yaml).unwrap();
        assert_eq!(config.template_formats, vec![TemplateFormat::Md, TemplateFormat::Njk]);
        assert_eq!(config.dir.input, "content");
        assert_eq!(config.dir.includes, "_includes");
        assert_eq!(config.dir.output, "dist");
        assert_eq!(config.path_prefix, "/blog/");
        assert_eq!(config.markdown_template_engine, Some(TemplateEngine::Liquid));
        assert_eq!(config.html_template_engine, None);
        assert_eq!(config.passthrough_copy.len(), 2);
        assert_eq!(config.site.title, "Notes");
        assert!(config.site.extra.contains_key("twitter"));
        assert!(!config.accepts(TemplateFormat::Html));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = BuildConfig::parse("  \n").unwrap();
        assert_eq!(config.dir.output, "_site");
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let err = BuildConfig::parse("markdown_template_engine: ejs").unwrap_err();
        assert!(format!("{:#}", err).contains("ejs"));
    }

    #[test]
    fn test_normalize_path_prefix() {
        assert_eq!(normalize_path_prefix(""), "/");
        assert_eq!(normalize_path_prefix("/"), "/");
        assert_eq!(normalize_path_prefix("blog"), "/blog/");
        assert_eq!(normalize_path_prefix("/blog"), "/blog/");
        assert_eq!(normalize_path_prefix("/a/b/"), "/a/b/");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            TemplateFormat::from_path(Path::new("posts/a.md")),
            Some(TemplateFormat::Md)
        );
        assert_eq!(
            TemplateFormat::from_path(Path::new("index.njk")),
            Some(TemplateFormat::Njk)
        );
        assert_eq!(TemplateFormat::from_path(Path::new("style.css")), None);
    }
}
