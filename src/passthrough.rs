//! Passthrough copy: files copied verbatim into the output tree

use anyhow::{Context, Result};
use glob::Pattern;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn is_glob(rule: &str) -> bool {
    rule.contains(['*', '?', '['])
}

fn normalize_rule(rule: &str) -> &str {
    rule.trim().trim_start_matches("./").trim_matches('/')
}

/// Whether a path relative to the input directory is claimed by a rule
pub fn covers(rules: &[String], relative: &Path) -> bool {
    rules.iter().any(|rule| {
        let rule = normalize_rule(rule);
        if rule.is_empty() {
            return false;
        }
        if is_glob(rule) {
            Pattern::new(rule)
                .map(|p| p.matches_path(relative))
                .unwrap_or(false)
        } else {
            relative.starts_with(rule)
        }
    })
}

/// Copy every file matched by `rules` from `input_dir` to the same relative
/// location under `output_dir`. Returns the number of files copied.
pub fn copy_all(rules: &[String], input_dir: &Path, output_dir: &Path) -> Result<usize> {
    let mut copied = 0;

    for raw in rules {
        let rule = normalize_rule(raw);
        if rule.is_empty() {
            continue;
        }

        let count = if is_glob(rule) {
            copy_glob(rule, input_dir, output_dir)?
        } else {
            let source = input_dir.join(rule);
            if source.is_dir() {
                copy_dir(&source, input_dir, output_dir)?
            } else if source.is_file() {
                copy_file(&source, input_dir, output_dir)?;
                1
            } else {
                tracing::warn!("Passthrough source {:?} does not exist", source);
                0
            }
        };

        tracing::debug!("Passthrough `{}` copied {} file(s)", rule, count);
        copied += count;
    }

    Ok(copied)
}

fn copy_glob(rule: &str, input_dir: &Path, output_dir: &Path) -> Result<usize> {
    let pattern = input_dir.join(rule);
    let pattern = pattern.to_string_lossy();
    let mut count = 0;

    for entry in glob::glob(&pattern).with_context(|| format!("Invalid passthrough glob `{}`", rule))? {
        match entry {
            Ok(path) if path.is_file() => {
                copy_file(&path, input_dir, output_dir)?;
                count += 1;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable passthrough match: {}", e),
        }
    }

    if count == 0 {
        tracing::warn!("Passthrough glob `{}` matched no files", rule);
    }
    Ok(count)
}

fn copy_dir(source: &Path, input_dir: &Path, output_dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().is_file() {
            copy_file(entry.path(), input_dir, output_dir)?;
            count += 1;
        }
    }
    Ok(count)
}

fn copy_file(path: &Path, input_dir: &Path, output_dir: &Path) -> Result<()> {
    let relative = path.strip_prefix(input_dir)?;
    let dest = output_dir.join(relative);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(path, &dest).with_context(|| format!("Failed to copy {:?} -> {:?}", path, dest))?;
    tracing::debug!("Copied: {:?} -> {:?}", path, dest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_copy_directory_verbatim() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("src");
        let output = dir.path().join("_site");
        write(&input.join("assets/css/site.css"), "body {  color: red; }");
        write(&input.join("assets/img/logo.svg"), "<svg/>");
        write(&input.join("assets/notes.md"), "# not rendered");

        let rules = vec!["assets".to_string()];
        let copied = copy_all(&rules, &input, &output).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(
            fs::read_to_string(output.join("assets/css/site.css")).unwrap(),
            "body {  color: red; }"
        );
        assert_eq!(
            fs::read_to_string(output.join("assets/notes.md")).unwrap(),
            "# not rendered"
        );
    }

    #[test]
    fn test_copy_single_file_and_glob() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("src");
        let output = dir.path().join("_site");
        write(&input.join("robots.txt"), "User-agent: *");
        write(&input.join("img/a.png"), "a");
        write(&input.join("img/b.jpg"), "b");

        let rules = vec!["./robots.txt".to_string(), "img/*.png".to_string()];
        let copied = copy_all(&rules, &input, &output).unwrap();

        assert_eq!(copied, 2);
        assert!(output.join("robots.txt").exists());
        assert!(output.join("img/a.png").exists());
        assert!(!output.join("img/b.jpg").exists());
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let dir = TempDir::new().unwrap();
        let rules = vec!["nope".to_string()];
        let copied = copy_all(&rules, dir.path(), &dir.path().join("out")).unwrap();
        assert_eq!(copied, 0);
    }

    #[test]
    fn test_covers() {
        let rules = vec!["assets/".to_string(), "**/*.png".to_string()];
        assert!(covers(&rules, Path::new("assets/page.html")));
        assert!(covers(&rules, Path::new("posts/img/x.png")));
        assert!(!covers(&rules, Path::new("assets-old/page.html")));
        assert!(!covers(&rules, Path::new("posts/hello.md")));
    }
}
