//! Cleaner: delete the output tree.
//!
//! Used as the first production step so nothing stale survives and the
//! image incremental filter cannot skip against old output.

use std::fs;
use std::io;
use std::path::Path;

use crate::tasks::TaskError;

/// Remove the output tree recursively. A missing tree is success.
pub fn clean(out_root: &Path) -> Result<(), TaskError> {
    match fs::remove_dir_all(out_root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
