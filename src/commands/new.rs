//! Create a new post

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::Site;

/// Directory under the input directory that holds posts
const POSTS_DIR: &str = "posts";

/// Create `<input>/posts/<slug>.md` with a front-matter scaffold
pub fn create_post(site: &Site, title: &str, tags: &[String]) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        anyhow::bail!("Cannot derive a file name from title {:?}", title);
    }

    let target_dir = site.input_dir.join(POSTS_DIR);
    fs::create_dir_all(&target_dir)?;

    let file_path = target_dir.join(format!("{}.md", slug));
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    fs::write(&file_path, scaffold(title, tags))?;
    tracing::info!("Created: {:?}", file_path);

    Ok(file_path)
}

fn scaffold(title: &str, tags: &[String]) -> String {
    let now = chrono::Local::now();
    let mut front = serde_yaml::Mapping::new();
    front.insert("title".into(), title.into());
    front.insert("description".into(), "".into());
    front.insert(
        "tags".into(),
        serde_yaml::Value::Sequence(tags.iter().map(|t| t.as_str().into()).collect()),
    );
    front.insert(
        "date".into(),
        now.format("%Y-%m-%d %H:%M:%S").to_string().into(),
    );
    front.insert("draft".into(), true.into());

    // Serializing a mapping cannot fail
    let yaml = serde_yaml::to_string(&front).unwrap_or_default();
    format!("---\n{}---\n\n", yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::content::FrontMatter;
    use tempfile::TempDir;

    #[test]
    fn test_create_post() {
        let dir = TempDir::new().unwrap();
        let site = Site::from_config(dir.path(), BuildConfig::default());

        let path = create_post(&site, "Hello: A \"Quoted\" Title", &["rust".to_string()]).unwrap();
        assert_eq!(path, site.input_dir.join("posts/hello-a-quoted-title.md"));

        let content = fs::read_to_string(&path).unwrap();
        let (fm, body) = FrontMatter::parse(&content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Hello: A \"Quoted\" Title"));
        assert_eq!(fm.tags, vec!["rust"]);
        assert!(fm.draft);
        assert!(fm.parse_date().is_some());
        assert!(body.is_empty());
    }

    #[test]
    fn test_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let site = Site::from_config(dir.path(), BuildConfig::default());
        create_post(&site, "Same", &[]).unwrap();
        assert!(create_post(&site, "Same", &[]).is_err());
    }
}
