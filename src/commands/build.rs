//! Build the static site

use anyhow::Result;
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::generator::{BuildReport, Generator};
use crate::Site;

/// Quiet period before a batch of file events triggers a rebuild
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Run one build pass
pub fn run(site: &Site) -> Result<BuildReport> {
    let start = Instant::now();

    let mut generator = Generator::new(site)?;
    let report = generator.generate()?;

    tracing::info!(
        "Wrote {} pages and copied {} files to {:?} in {:.2}s",
        report.pages_written,
        report.files_copied,
        site.output_dir,
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}

/// Whether a changed path should trigger a rebuild
pub(crate) fn is_relevant_change(site: &Site, path: &Path) -> bool {
    if path.starts_with(&site.output_dir) {
        return false;
    }
    let path_str = path.to_string_lossy();
    !path_str.contains("/.git")
        && !path_str.contains(".DS_Store")
        && !path_str.contains("node_modules")
        && !path_str.ends_with('~')
}

/// Relevant paths in one debounced batch, each listed once
pub(crate) fn relevant_changes<'a, I>(site: &Site, paths: I) -> BTreeSet<&'a Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    paths
        .into_iter()
        .filter(|p| is_relevant_change(site, p))
        .collect()
}

/// Watch for file changes and rebuild, blocking the calling thread
pub fn watch(site: &Site) -> Result<()> {
    tracing::info!("Watching {:?} for changes. Press Ctrl+C to stop.", site.input_dir);
    watch_with(site, |_| {})
}

/// Rebuild once per debounced batch of relevant changes.
///
/// Events arriving while a rebuild runs are queued by the debouncer and
/// form the next batch, so no edit is lost.
pub(crate) fn watch_with<F>(site: &Site, mut on_rebuild: F) -> Result<()>
where
    F: FnMut(&BuildReport),
{
    let (tx, rx) = channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(DEBOUNCE, tx)?;

    let targets = [
        (site.input_dir.clone(), RecursiveMode::Recursive),
        (site.config_path(), RecursiveMode::NonRecursive),
    ];
    for (path, mode) in targets.iter().filter(|(path, _)| path.exists()) {
        debouncer.watcher().watch(path, *mode)?;
        tracing::debug!("Watching {:?}", path);
    }

    for result in rx {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
        };

        let changed = relevant_changes(site, events.iter().map(|e| e.path.as_path()));
        if changed.is_empty() {
            continue;
        }
        for path in &changed {
            tracing::info!("Changed: {}", path.display());
        }

        match rebuild(site) {
            Ok(report) => on_rebuild(&report),
            Err(e) => tracing::error!("Rebuild failed, keeping previous output: {:#}", e),
        }
    }

    Ok(())
}

/// Rebuild after a change, picking up edits to the config file
pub(crate) fn rebuild(site: &Site) -> Result<BuildReport> {
    let mut fresh = Site::new(&site.base_dir)?.with_drafts(site.include_drafts);
    fresh.output_dir = site.output_dir.clone();
    fresh.config.path_prefix = site.config.path_prefix.clone();
    run(&fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    #[test]
    fn test_output_changes_ignored() {
        let site = Site::from_config("/blog", BuildConfig::default());
        assert!(!is_relevant_change(&site, Path::new("/blog/_site/index.html")));
        assert!(!is_relevant_change(&site, Path::new("/blog/src/.git/HEAD")));
        assert!(!is_relevant_change(&site, Path::new("/blog/src/post.md~")));
        assert!(is_relevant_change(&site, Path::new("/blog/src/posts/a.md")));
        assert!(is_relevant_change(&site, Path::new("/blog/kiln.yml")));
    }

    #[test]
    fn test_batch_collapses_to_relevant_paths() {
        let site = Site::from_config("/blog", BuildConfig::default());
        let batch = [
            Path::new("/blog/src/posts/a.md"),
            Path::new("/blog/_site/posts/a/index.html"),
            Path::new("/blog/src/posts/a.md"),
            Path::new("/blog/src/posts/b.md~"),
            Path::new("/blog/src/posts/b.md"),
        ];
        let changed = relevant_changes(&site, batch);
        assert_eq!(
            changed.into_iter().collect::<Vec<_>>(),
            vec![Path::new("/blog/src/posts/a.md"), Path::new("/blog/src/posts/b.md")]
        );

        let only_output = [Path::new("/blog/_site/index.html")];
        assert!(relevant_changes(&site, only_output).is_empty());
    }

    #[test]
    fn test_edits_during_rebuild_form_next_batch() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let site = Site::from_config(dir.path(), BuildConfig::default());

        let (tx, rx) = channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(Duration::from_millis(100), tx).unwrap();
        debouncer
            .watcher()
            .watch(&src, RecursiveMode::Recursive)
            .unwrap();

        std::fs::write(src.join("first.md"), "one").unwrap();
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        let first = relevant_changes(&site, first.iter().map(|e| e.path.as_path()));
        assert!(first.iter().any(|p| p.ends_with("first.md")));

        // Saved right after the first batch, before any quiet period
        std::fs::write(src.join("second.md"), "two").unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        let second = relevant_changes(&site, second.iter().map(|e| e.path.as_path()));
        assert!(second.iter().any(|p| p.ends_with("second.md")));
    }
}
