//! Configuration loading and discovery for `webforge.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{ForgeConfig, ProjectConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse webforge.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output tree root
    pub out: Option<PathBuf>,
    /// Override preview server port
    pub port: Option<u16>,
}

/// Find webforge.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find webforge.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join("webforge.toml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a webforge.toml file.
///
/// If a path is provided, loads from that file. Otherwise uses
/// [`find_config`] to locate one. If no config file is found, returns a
/// default configuration named after the current directory.
pub fn load_config(path: Option<&Path>) -> Result<ForgeConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<ForgeConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ForgeConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no webforge.toml is found.
pub fn default_config() -> ForgeConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    let toml = format!("[project]\nname = \"{}\"\n", project_name);
    toml::from_str(&toml).unwrap_or_else(|_| ForgeConfig {
        project: ProjectConfig {
            name: "unnamed".to_string(),
            src: PathBuf::from("src"),
            out: PathBuf::from("dist"),
        },
        paths: Default::default(),
        browsers: vec!["last 2 versions".to_string()],
        images: Default::default(),
        watch: Default::default(),
        serve: Default::default(),
    })
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut ForgeConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(port) = overrides.port {
        config.serve.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("webforge.toml");
        File::create(&config_path).unwrap().write_all(b"[project]\nname = \"test\"").unwrap();

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("webforge.toml");
        File::create(&config_path).unwrap().write_all(b"[project]\nname = \"test\"").unwrap();

        let subdir = temp.path().join("src").join("sass");
        fs::create_dir_all(&subdir).unwrap();

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().unwrap();
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("webforge.toml");
        File::create(&config_path)
            .unwrap()
            .write_all(
                br#"
[project]
name = "my-site"
out = "public"

[serve]
port = 4000
"#,
            )
            .unwrap();

        let config = load_config(Some(&config_path)).unwrap();
        assert_eq!(config.project.name, "my-site");
        assert_eq!(config.project.out, PathBuf::from("public"));
        assert_eq!(config.serve.port, 4000);
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("webforge.toml");
        File::create(&config_path).unwrap().write_all(b"not valid toml {{{").unwrap();

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("webforge.toml");
        File::create(&config_path)
            .unwrap()
            .write_all(
                br#"
[project]
name = ""

[serve]
port = 0
"#,
            )
            .unwrap();

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert!(!config.project.name.is_empty());
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert!(config.is_valid());
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        let overrides =
            CliOverrides { out: Some(PathBuf::from("public")), port: Some(9000) };

        merge_cli_overrides(&mut config, &overrides);
        assert_eq!(config.project.out, PathBuf::from("public"));
        assert_eq!(config.serve.port, 9000);
    }
}
