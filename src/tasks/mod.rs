//! Build tasks
//!
//! Each task wraps one external capability: `styles` compiles Sass and
//! post-processes CSS, `scripts` transpiles JS, `images` optimizes image
//! assets, `markup` relays HTML, `clean` removes the output tree. Tasks
//! share the filesystem as their only hand-off medium; the pipeline
//! decides how failures are surfaced.

pub mod clean;
pub mod images;
pub mod markup;
pub mod scripts;
pub mod styles;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error from a build task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Filesystem error (missing source tree, permissions). Fatal.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Invalid glob pattern (configured source paths)
    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
    /// Sass compilation failed
    #[error("Sass error in {file}: {message}")]
    Sass { file: PathBuf, message: String },
    /// CSS post-processing failed
    #[error("CSS error in {file}: {message}")]
    Css { file: PathBuf, message: String },
    /// Script transpilation failed
    #[error("Script error in {file}: {message}")]
    Script { file: PathBuf, message: String },
    /// Image optimization failed
    #[error("Image error in {file}: {message}")]
    Image { file: PathBuf, message: String },
}

/// Map a source path to its destination, preserving structure below `from`.
pub(crate) fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    path.strip_prefix(from).ok().map(|rel| to.join(rel))
}

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
