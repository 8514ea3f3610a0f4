//! Project configuration (`webforge.toml`)
//!
//! Discovery, parsing, validation, and CLI override merging.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, CliOverrides,
    ConfigError,
};
pub use schema::{ForgeConfig, ImagesConfig, ResolvedPaths, ServeConfig, WatchConfig};
