//! Configuration schema types for `webforge.toml`
//!
//! Defines the structure and validation rules for webforge project
//! configuration: source/output layout, browser support matrix, image
//! encoder settings, watch debounce, and preview server options.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project metadata and root directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source tree root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Output tree root
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// Source subdirectories and output subdirectories.
///
/// Source entries are relative to `project.src`, output entries to
/// `project.out`. Markup has no entry: every `.html` under the source root
/// (outside `node_modules` and the output tree) is relayed to the output
/// root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Sass sources (`**/*.scss` below this)
    #[serde(default = "default_sass")]
    pub sass: PathBuf,
    /// Script sources (every file below this)
    #[serde(default = "default_scripts")]
    pub scripts: PathBuf,
    /// Image sources (every file below this)
    #[serde(default = "default_images")]
    pub images: PathBuf,
    /// Compiled stylesheet destination
    #[serde(default = "default_css_out")]
    pub css_out: PathBuf,
    /// Transpiled script destination
    #[serde(default = "default_scripts_out")]
    pub scripts_out: PathBuf,
    /// Optimized image destination
    #[serde(default = "default_images_out")]
    pub images_out: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sass: default_sass(),
            scripts: default_scripts(),
            images: default_images(),
            css_out: default_css_out(),
            scripts_out: default_scripts_out(),
            images_out: default_images_out(),
        }
    }
}

fn default_sass() -> PathBuf {
    PathBuf::from("sass")
}

fn default_scripts() -> PathBuf {
    PathBuf::from("js")
}

fn default_images() -> PathBuf {
    PathBuf::from("images")
}

fn default_css_out() -> PathBuf {
    PathBuf::from("assets/css")
}

fn default_scripts_out() -> PathBuf {
    PathBuf::from("assets/js")
}

fn default_images_out() -> PathBuf {
    PathBuf::from("assets/images")
}

/// Image encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// WebP derivative quality (1-100)
    #[serde(default = "default_webp_quality")]
    pub webp_quality: u8,
    /// PNG optimization effort (oxipng preset, 0-6)
    #[serde(default = "default_png_effort")]
    pub png_effort: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            webp_quality: default_webp_quality(),
            png_effort: default_png_effort(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_webp_quality() -> u8 {
    75
}

fn default_png_effort() -> u8 {
    2
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

fn default_debounce_ms() -> u32 {
    100
}

/// Preview server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Local port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_browsers() -> Vec<String> {
    [
        "last 2 versions",
        "> 5%",
        "ie 11",
        "not ie <= 10",
        "ios >= 8",
        "and_chr >= 5",
        "android >= 5",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Complete webforge.toml configuration
///
/// `browsers` is a top-level key; TOML requires it to appear before the
/// first `[table]` header. Misplacing it under a table is a parse error,
/// not a silent fallback to the default matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Source/output layout
    #[serde(default)]
    pub paths: PathsConfig,
    /// Browser support matrix for vendor prefixing and downleveling
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Image encoder settings
    #[serde(default)]
    pub images: ImagesConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.jpeg_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "webforge.toml: '{}' {}", self.field, self.message)
    }
}

impl ForgeConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        // The output tree must not sit inside the source tree, or every
        // build would feed its own output back in as source.
        if self.project.out == self.project.src || self.project.out.starts_with(&self.project.src)
        {
            errors.push(ConfigValidationError {
                field: "project.out".to_string(),
                message: "must not be inside the source tree".to_string(),
            });
        }

        if self.browsers.is_empty() {
            errors.push(ConfigValidationError {
                field: "browsers".to_string(),
                message: "must contain at least one browserslist query".to_string(),
            });
        }

        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            errors.push(ConfigValidationError {
                field: "images.jpeg_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        if self.images.webp_quality == 0 || self.images.webp_quality > 100 {
            errors.push(ConfigValidationError {
                field: "images.webp_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        if self.images.png_effort > 6 {
            errors.push(ConfigValidationError {
                field: "images.png_effort".to_string(),
                message: "must be between 0 and 6".to_string(),
            });
        }

        if self.serve.port == 0 {
            errors.push(ConfigValidationError {
                field: "serve.port".to_string(),
                message: "must be a non-zero port number".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Resolve all configured paths against a project root.
    pub fn resolve(&self, project_root: &Path) -> ResolvedPaths {
        let src_root = resolve_one(project_root, &self.project.src);
        let out_root = resolve_one(project_root, &self.project.out);
        ResolvedPaths {
            sass_dir: src_root.join(&self.paths.sass),
            scripts_dir: src_root.join(&self.paths.scripts),
            images_dir: src_root.join(&self.paths.images),
            css_out: out_root.join(&self.paths.css_out),
            scripts_out: out_root.join(&self.paths.scripts_out),
            images_out: out_root.join(&self.paths.images_out),
            src_root,
            out_root,
        }
    }
}

fn resolve_one(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// All pipeline directories resolved to absolute (or root-relative) paths.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    /// Source tree root
    pub src_root: PathBuf,
    /// Output tree root
    pub out_root: PathBuf,
    /// Sass source directory
    pub sass_dir: PathBuf,
    /// Script source directory
    pub scripts_dir: PathBuf,
    /// Image source directory
    pub images_dir: PathBuf,
    /// Compiled stylesheet destination
    pub css_out: PathBuf,
    /// Transpiled script destination
    pub scripts_out: PathBuf,
    /// Optimized image destination
    pub images_out: PathBuf,
}
