//! Watch mode: rebuild changed asset categories and push reloads.
//!
//! One debounced watcher covers the whole source root. Each batch of
//! events is classified into task categories (styles, scripts, images,
//! markup); only the affected tasks rerun, in pipeline order, and each
//! completed task is followed by one reload signal to connected preview
//! clients. Task failures are non-fatal here; watching continues.

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use thiserror::Error;

use crate::config::ResolvedPaths;
use crate::pipeline::{Pipeline, TaskKind, TaskStatus};
use crate::serve::ReloadHandle;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// Source directory not found
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Classify a changed path into the task category it affects.
///
/// Paths outside the source root, and anything already under the output
/// root, map to no category. Files under the source root that are not
/// styles, scripts, or images count as markup only when they are HTML.
pub fn classify(path: &Path, paths: &ResolvedPaths) -> Option<TaskKind> {
    if path.starts_with(&paths.out_root) {
        return None;
    }
    if path.starts_with(&paths.sass_dir) {
        return Some(TaskKind::Styles);
    }
    if path.starts_with(&paths.scripts_dir) {
        return Some(TaskKind::Scripts);
    }
    if path.starts_with(&paths.images_dir) {
        return Some(TaskKind::Images);
    }
    if path.starts_with(&paths.src_root)
        && path.extension().map(|e| e.eq_ignore_ascii_case("html")).unwrap_or(false)
    {
        return Some(TaskKind::Markup);
    }
    None
}

/// Map a batch of changed paths to the affected task categories, deduped
/// and in pipeline order.
pub fn affected(changed: &[PathBuf], paths: &ResolvedPaths) -> Vec<TaskKind> {
    let hits: Vec<TaskKind> = changed.iter().filter_map(|p| classify(p, paths)).collect();
    TaskKind::ORDERED.into_iter().filter(|k| hits.contains(k)).collect()
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Watch the source root and rebuild affected categories on change.
///
/// Blocks until interrupted (Ctrl+C). Each debounced batch runs the
/// affected tasks in pipeline order; after every task, one reload signal
/// goes out so open pages pick up the fresh output.
pub fn watch_and_rebuild(
    pipeline: &Pipeline,
    debounce_ms: u32,
    reload: &ReloadHandle,
) -> Result<(), WatchError> {
    let paths = &pipeline.context().paths;
    if !paths.src_root.exists() {
        return Err(WatchError::SourceNotFound(paths.src_root.clone()));
    }

    let (tx, rx) = channel();
    let debounce_duration = Duration::from_millis(debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;
    debouncer
        .watcher()
        .watch(&paths.src_root, RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    println!("[{}] Watching {} for changes...", timestamp(), paths.src_root.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<PathBuf> = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path.clone())
                    .collect();

                let kinds = affected(&changed, paths);
                if kinds.is_empty() {
                    continue;
                }

                for path in &changed {
                    if let Some(name) = path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }

                for kind in kinds {
                    let result = pipeline.run_task_guarded(kind);
                    match &result.status {
                        TaskStatus::Success => {
                            println!(
                                "[{}] {} rebuilt ({}) - {} file{}",
                                timestamp(),
                                kind,
                                format_duration(result.duration),
                                result.outputs.len(),
                                if result.outputs.len() == 1 { "" } else { "s" }
                            );
                        }
                        TaskStatus::Failed(message) => {
                            eprintln!("[{}] {} failed: {}", timestamp(), kind, message);
                        }
                    }
                    reload.send();
                }

                println!(
                    "[{}] Watching {} for changes...",
                    timestamp(),
                    paths.src_root.display()
                );
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::Channel(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForgeConfig;

    fn paths_for(root: &Path) -> ResolvedPaths {
        let config: ForgeConfig = toml::from_str("[project]\nname = \"test\"\n").unwrap();
        config.resolve(root)
    }

    #[test]
    fn test_classify_by_directory() {
        let paths = paths_for(Path::new("/proj"));
        assert_eq!(
            classify(Path::new("/proj/src/sass/style.scss"), &paths),
            Some(TaskKind::Styles)
        );
        assert_eq!(classify(Path::new("/proj/src/js/app.js"), &paths), Some(TaskKind::Scripts));
        assert_eq!(
            classify(Path::new("/proj/src/images/logo.png"), &paths),
            Some(TaskKind::Images)
        );
        assert_eq!(classify(Path::new("/proj/src/index.html"), &paths), Some(TaskKind::Markup));
    }

    #[test]
    fn test_classify_ignores_output_and_foreign_paths() {
        let paths = paths_for(Path::new("/proj"));
        assert_eq!(classify(Path::new("/proj/dist/assets/css/style.css"), &paths), None);
        assert_eq!(classify(Path::new("/proj/readme.md"), &paths), None);
        assert_eq!(classify(Path::new("/elsewhere/src/index.html"), &paths), None);
    }

    #[test]
    fn test_classify_non_html_under_src_root() {
        let paths = paths_for(Path::new("/proj"));
        assert_eq!(classify(Path::new("/proj/src/notes.txt"), &paths), None);
    }

    #[test]
    fn test_affected_dedupes_and_orders() {
        let paths = paths_for(Path::new("/proj"));
        let changed = vec![
            PathBuf::from("/proj/src/index.html"),
            PathBuf::from("/proj/src/sass/a.scss"),
            PathBuf::from("/proj/src/sass/b.scss"),
        ];
        assert_eq!(affected(&changed, &paths), vec![TaskKind::Styles, TaskKind::Markup]);
    }

    #[test]
    fn test_affected_single_script() {
        let paths = paths_for(Path::new("/proj"));
        let changed = vec![PathBuf::from("/proj/src/js/app.js")];
        assert_eq!(affected(&changed, &paths), vec![TaskKind::Scripts]);
    }

    #[test]
    fn test_affected_empty_batch() {
        let paths = paths_for(Path::new("/proj"));
        assert!(affected(&[], &paths).is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
