//! Markup relay: copy HTML from the source tree to the output tree.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::config::ResolvedPaths;
use crate::tasks::{ensure_parent, rebase, TaskError};

/// Copy every `.html` under the source root to the output root,
/// byte-identically, preserving relative structure.
///
/// Files under `node_modules/` or inside the output tree are ignored so
/// the pipeline never feeds its own output back in.
pub fn relay(paths: &ResolvedPaths) -> Result<Vec<PathBuf>, TaskError> {
    let pattern = format!("{}/**/*.html", paths.src_root.display());
    let mut written = Vec::new();

    for entry in glob(&pattern)?.flatten() {
        if is_excluded(&entry, &paths.out_root) {
            continue;
        }
        let Some(dest) = rebase(&entry, &paths.src_root, &paths.out_root) else {
            continue;
        };
        ensure_parent(&dest)?;
        fs::copy(&entry, &dest)?;
        written.push(dest);
    }

    Ok(written)
}

fn is_excluded(path: &Path, out_root: &Path) -> bool {
    path.starts_with(out_root)
        || path.components().any(|c| c.as_os_str() == "node_modules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_for(temp: &TempDir) -> ResolvedPaths {
        let config: crate::config::ForgeConfig =
            toml::from_str("[project]\nname = \"test\"\n").unwrap();
        config.resolve(temp.path())
    }

    #[test]
    fn test_relay_copies_preserving_structure() {
        let temp = TempDir::new().unwrap();
        let paths = paths_for(&temp);
        fs::create_dir_all(paths.src_root.join("pages")).unwrap();
        fs::write(paths.src_root.join("index.html"), "<html></html>").unwrap();
        fs::write(paths.src_root.join("pages/about.html"), "<html>about</html>").unwrap();

        let written = relay(&paths).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(paths.out_root.join("index.html")).unwrap(),
            "<html></html>"
        );
        assert_eq!(
            fs::read_to_string(paths.out_root.join("pages/about.html")).unwrap(),
            "<html>about</html>"
        );
    }

    #[test]
    fn test_relay_skips_node_modules() {
        let temp = TempDir::new().unwrap();
        let paths = paths_for(&temp);
        fs::create_dir_all(paths.src_root.join("node_modules/pkg")).unwrap();
        fs::write(paths.src_root.join("node_modules/pkg/demo.html"), "x").unwrap();

        let written = relay(&paths).unwrap();
        assert!(written.is_empty());
        assert!(!paths.out_root.join("node_modules/pkg/demo.html").exists());
    }

    #[test]
    fn test_relay_skips_output_tree() {
        // Output tree nested under the source root must not be re-copied.
        let temp = TempDir::new().unwrap();
        let mut paths = paths_for(&temp);
        paths.out_root = paths.src_root.join("dist");
        fs::create_dir_all(&paths.out_root).unwrap();
        fs::write(paths.out_root.join("old.html"), "stale").unwrap();
        fs::write(paths.src_root.join("index.html"), "fresh").unwrap();

        let written = relay(&paths).unwrap();
        assert_eq!(written.len(), 1);
        assert!(!paths.out_root.join("dist").exists());
    }

    #[test]
    fn test_relay_empty_source() {
        let temp = TempDir::new().unwrap();
        let paths = paths_for(&temp);
        let written = relay(&paths).unwrap();
        assert!(written.is_empty());
    }
}
