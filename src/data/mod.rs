//! Data cascade: global data files and directory data files

use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::content::scalar_to_string;
use crate::error::{BuildError, BuildResult};

/// Extensions recognised for data files
const DATA_EXTENSIONS: [&str; 4] = ["json", "yml", "yaml", "toml"];

/// Global data from the data directory, keyed by file stem.
///
/// `_data/site/links.yml` is exposed as `site.links`.
#[derive(Debug, Clone, Default)]
pub struct GlobalData {
    root: serde_json::Map<String, serde_json::Value>,
}

impl GlobalData {
    /// Load every data file under `data_dir`
    pub fn load(data_dir: &Path) -> BuildResult<Self> {
        let mut data = Self::default();
        if !data_dir.exists() {
            return Ok(data);
        }

        for entry in WalkDir::new(data_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !DATA_EXTENSIONS.contains(&ext) {
                tracing::warn!("Skipping data file with unknown extension: {:?}", path);
                continue;
            }

            let value = read_data_file(path)?;
            let relative = path.strip_prefix(data_dir).unwrap_or(path);
            let mut keys: Vec<String> = relative
                .parent()
                .map(|p| {
                    p.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect()
                })
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            keys.push(stem);

            insert_nested(&mut data.root, &keys, value);
            tracing::debug!("Loaded data file {:?} as {}", path, keys.join("."));
        }

        Ok(data)
    }

    /// Top-level entries, for the template context
    pub fn entries(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.root
    }
}

fn insert_nested(
    root: &mut serde_json::Map<String, serde_json::Value>,
    keys: &[String],
    value: serde_json::Value,
) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut current = root;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        let serde_json::Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(last.clone(), value);
}

/// Read a JSON, YAML or TOML file into a JSON value
fn read_data_file(path: &Path) -> BuildResult<serde_json::Value> {
    let data_error = |message: String| BuildError::Data {
        path: path.to_path_buf(),
        message,
    };
    let content = fs::read_to_string(path).map_err(|e| data_error(e.to_string()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| data_error(e.to_string())),
        Some("toml") => {
            let value: toml::Value =
                toml::from_str(&content).map_err(|e| data_error(e.to_string()))?;
            serde_json::to_value(value).map_err(|e| data_error(e.to_string()))
        }
        _ => {
            let value: Value =
                serde_yaml::from_str(&content).map_err(|e| data_error(e.to_string()))?;
            serde_json::to_value(value).map_err(|e| data_error(e.to_string()))
        }
    }
}

/// Directory data files (`posts/posts.json`), cached per directory
#[derive(Debug)]
pub struct DirectoryData {
    input_dir: PathBuf,
    cache: HashMap<PathBuf, Mapping>,
}

impl DirectoryData {
    pub fn new(input_dir: &Path) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            cache: HashMap::new(),
        }
    }

    /// Merged data for a file, from the input root down to its directory
    pub fn for_file(&mut self, path: &Path) -> BuildResult<Mapping> {
        let relative = path.strip_prefix(&self.input_dir).unwrap_or(path);
        let mut merged = Mapping::new();
        let mut dir = self.input_dir.clone();

        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                dir.push(component);
                let data = self.load_dir(&dir)?;
                merge_data(&mut merged, data);
            }
        }

        Ok(merged)
    }

    fn load_dir(&mut self, dir: &Path) -> BuildResult<Mapping> {
        if let Some(cached) = self.cache.get(dir) {
            return Ok(cached.clone());
        }

        let mut data = Mapping::new();
        if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
            for ext in ["json", "yml", "yaml"] {
                let candidate = dir.join(format!("{}.{}", name, ext));
                if !candidate.is_file() {
                    continue;
                }
                let value = read_data_file(&candidate)?;
                let value: Value = serde_yaml::to_value(value).map_err(|e| BuildError::Data {
                    path: candidate.clone(),
                    message: e.to_string(),
                })?;
                match value {
                    Value::Mapping(map) => merge_data(&mut data, map),
                    _ => {
                        return Err(BuildError::Data {
                            path: candidate,
                            message: "directory data must be an object".to_string(),
                        })
                    }
                }
                tracing::debug!("Loaded directory data {:?}", candidate);
            }
        }

        self.cache.insert(dir.to_path_buf(), data.clone());
        Ok(data)
    }
}

/// Merge `overlay` into `base`.
///
/// Nested mappings merge recursively; a top-level `tags` value is
/// concatenated with the existing tags instead of replacing them.
pub fn merge_data(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        if key.as_str() == Some("tags") {
            let mut tags = tag_list(base.get(&key));
            for tag in tag_list(Some(&value)) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            base.insert(key, Value::Sequence(tags));
            continue;
        }
        merge_value(base, key, value);
    }
}

fn merge_value(base: &mut Mapping, key: Value, value: Value) {
    if let Value::Mapping(incoming) = value {
        if let Some(Value::Mapping(existing)) = base.get_mut(&key) {
            for (k, v) in incoming {
                merge_value(existing, k, v);
            }
            return;
        }
        base.insert(key, Value::Mapping(incoming));
        return;
    }
    base.insert(key, value);
}

/// Tags as a list; scalars become strings, anything else is kept so
/// front-matter deserialization can reject it with the file's path
fn tag_list(value: Option<&Value>) -> Vec<Value> {
    let normalize = |v: &Value| match scalar_to_string(v) {
        Some(tag) => Value::String(tag),
        None => v.clone(),
    };
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq.iter().map(normalize).collect(),
        Some(other) => vec![normalize(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_merge_overrides_and_concatenates_tags() {
        let mut base = mapping("layout: post.njk\ntags: posts\nauthor:\n  name: A\n  site: a.example\n");
        merge_data(
            &mut base,
            mapping("tags: [rust, posts]\nauthor:\n  name: B\ntitle: Hi\n"),
        );

        assert_eq!(base.get("layout").and_then(Value::as_str), Some("post.njk"));
        assert_eq!(base.get("title").and_then(Value::as_str), Some("Hi"));
        assert_eq!(
            tag_list(base.get("tags")),
            vec![Value::from("posts"), Value::from("rust")]
        );
        let author = base.get("author").and_then(Value::as_mapping).unwrap();
        assert_eq!(author.get("name").and_then(Value::as_str), Some("B"));
        assert_eq!(author.get("site").and_then(Value::as_str), Some("a.example"));
    }

    #[test]
    fn test_merge_keeps_numeric_tags() {
        let mut base = mapping("tags: 2023\n");
        merge_data(&mut base, mapping("tags: [2024, rust, 2023]\n"));
        assert_eq!(
            tag_list(base.get("tags")),
            vec![Value::from("2023"), Value::from("2024"), Value::from("rust")]
        );
    }

    #[test]
    fn test_global_data_loading() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("_data");
        fs::create_dir_all(data_dir.join("nested")).unwrap();
        fs::write(data_dir.join("metadata.json"), r#"{"title": "Blog"}"#).unwrap();
        fs::write(data_dir.join("links.yml"), "- one\n- two\n").unwrap();
        fs::write(data_dir.join("build.toml"), "env = \"prod\"\n").unwrap();
        fs::write(data_dir.join("nested/deep.yaml"), "key: value\n").unwrap();
        fs::write(data_dir.join("notes.txt"), "ignored").unwrap();

        let data = GlobalData::load(&data_dir).unwrap();
        assert_eq!(data.entries().get("metadata").unwrap()["title"], "Blog");
        assert_eq!(data.entries().get("links").unwrap()[1], "two");
        assert_eq!(data.entries().get("build").unwrap()["env"], "prod");
        assert_eq!(data.entries().get("nested").unwrap()["deep"]["key"], "value");
        assert!(data.entries().get("notes").is_none());
    }

    #[test]
    fn test_missing_data_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let data = GlobalData::load(&dir.path().join("_data")).unwrap();
        assert!(data.entries().is_empty());
    }

    #[test]
    fn test_invalid_data_file_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let err = GlobalData::load(dir.path()).unwrap_err();
        assert!(matches!(err, BuildError::Data { .. }));
    }

    #[test]
    fn test_directory_data_cascade() {
        let dir = TempDir::new().unwrap();
        let input = dir.path();
        fs::create_dir_all(input.join("posts/2024")).unwrap();
        fs::write(
            input.join("posts/posts.json"),
            r#"{"layout": "post.njk", "tags": ["posts"]}"#,
        )
        .unwrap();
        fs::write(input.join("posts/2024/2024.yml"), "tags: archive\nyear: 2024\n").unwrap();

        let mut dirs = DirectoryData::new(input);
        let data = dirs.for_file(&input.join("posts/2024/hello.md")).unwrap();
        assert_eq!(data.get("layout").and_then(Value::as_str), Some("post.njk"));
        assert_eq!(
            tag_list(data.get("tags")),
            vec![Value::from("posts"), Value::from("archive")]
        );

        let root = dirs.for_file(&input.join("about.md")).unwrap();
        assert!(root.is_empty());
    }
}
