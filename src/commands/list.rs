//! List site content

use anyhow::Result;

use crate::collections::Collections;
use crate::content::loader::ContentLoader;
use crate::content::Page;
use crate::Site;

/// Print site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let loaded = ContentLoader::new(site).load()?;
    for line in lines(&loaded.pages, content_type)? {
        println!("{}", line);
    }
    Ok(())
}

/// Listing lines for a content type
pub fn lines(pages: &[Page], content_type: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();

    match content_type {
        "post" | "posts" => {
            let mut posts: Vec<&Page> = pages.iter().filter(|p| p.is_tagged()).collect();
            posts.sort_by(|a, b| b.date.cmp(&a.date));
            out.push(format!("Posts ({}):", posts.len()));
            for post in posts {
                let draft = if post.data.draft { " (draft)" } else { "" };
                out.push(format!(
                    "  {} - {}{} [{}]",
                    post.date.format("%Y-%m-%d"),
                    post.data.title.as_deref().unwrap_or(&post.file_slug),
                    draft,
                    post.relative_path
                ));
            }
        }
        "page" | "pages" => {
            out.push(format!("Pages ({}):", pages.len()));
            for page in pages {
                out.push(format!(
                    "  {} [{}]",
                    page.data.title.as_deref().unwrap_or(&page.file_slug),
                    page.relative_path
                ));
            }
        }
        "tag" | "tags" => {
            let collections = Collections::build(pages, false);
            let mut tags: Vec<(&str, usize)> = collections
                .tags()
                .map(|tag| (tag, collections.get(tag).map_or(0, <[_]>::len)))
                .collect();
            out.push(format!("Tags ({}):", tags.len()));
            tags.sort_by(|a, b| b.1.cmp(&a.1));
            for (tag, count) in tags {
                out.push(format!("  {} ({})", tag, count));
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: posts, pages, tags",
                content_type
            );
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Vec<Page>) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("posts")).unwrap();
        fs::write(
            src.join("posts/a.md"),
            "---\ntitle: Alpha\ndate: 2024-01-01\ntags: [posts, rust]\n---\n",
        )
        .unwrap();
        fs::write(
            src.join("posts/b.md"),
            "---\ntitle: Beta\ndate: 2024-02-01\ntags: posts\n---\n",
        )
        .unwrap();
        fs::write(src.join("about.md"), "---\ntitle: About\n---\n").unwrap();

        let site = Site::from_config(dir.path(), BuildConfig::default());
        let pages = ContentLoader::new(&site).load().unwrap().pages;
        (dir, pages)
    }

    #[test]
    fn test_list_posts_newest_first() {
        let (_dir, pages) = fixture();
        let out = lines(&pages, "posts").unwrap();
        assert_eq!(out[0], "Posts (2):");
        assert_eq!(out[1], "  2024-02-01 - Beta [posts/b.md]");
        assert_eq!(out[2], "  2024-01-01 - Alpha [posts/a.md]");
    }

    #[test]
    fn test_list_tags_by_count() {
        let (_dir, pages) = fixture();
        let out = lines(&pages, "tags").unwrap();
        assert_eq!(out, vec!["Tags (2):", "  posts (2)", "  rust (1)"]);
    }

    #[test]
    fn test_unknown_type() {
        assert!(lines(&[], "categories").is_err());
    }
}
