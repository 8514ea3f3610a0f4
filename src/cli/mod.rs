//! Command-line interface implementation
//!
//! Two commands over the same pipeline: `dev` (build once, then watch and
//! serve with non-fatal errors) and `build` (clean production build,
//! fail-fast). `dev` is the default when no subcommand is given.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{find_config, load_config, merge_cli_overrides, CliOverrides, ForgeConfig};
use crate::notifier;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::serve::ReloadHandle;
use crate::watch;

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Webforge - Build front-end assets (Sass, scripts, images, markup)
#[derive(Parser)]
#[command(name = "webforge")]
#[command(about = "Webforge - Compile Sass, transpile scripts, optimize images, serve previews")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to webforge.toml (default: walk up from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the output tree root
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build once, then watch for changes and serve a live preview
    Dev {
        /// Preview server port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Production build: clean the output tree, then build everything
    Build,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webforge=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    // Find config file path and determine project root
    let (config, project_root) = match cli.config.clone().or_else(find_config) {
        Some(config_path) => {
            if cli.verbose {
                println!("Using config: {}", config_path.display());
            }
            let cfg = match load_config(Some(&config_path)) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Error loading config: {}", e);
                    return ExitCode::from(EXIT_ERROR);
                }
            };
            let root = config_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            (cfg, root)
        }
        None => {
            if cli.verbose {
                println!("No webforge.toml found, using defaults");
            }
            let root = std::env::current_dir().unwrap_or_default();
            (crate::config::default_config(), root)
        }
    };

    let mut config = config;
    let port = match &cli.command {
        Some(Commands::Dev { port }) => *port,
        _ => None,
    };
    let overrides = CliOverrides { out: cli.out.clone(), port };
    merge_cli_overrides(&mut config, &overrides);

    // Overrides and the no-config default path skip file-load validation,
    // so the merged config is checked here before anything builds.
    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("Error: {}", error);
        }
        return ExitCode::from(EXIT_ERROR);
    }

    match cli.command {
        Some(Commands::Build) => run_build(config, project_root, cli.verbose),
        Some(Commands::Dev { .. }) | None => run_dev(config, project_root, cli.verbose),
    }
}

/// Development pipeline: full build, then watch + serve concurrently.
fn run_dev(config: ForgeConfig, project_root: PathBuf, verbose: bool) -> ExitCode {
    notifier::set_enabled(true);

    let context = PipelineContext::new(&config, &project_root).with_verbose(verbose);
    let paths = context.paths.clone();
    if !paths.src_root.exists() {
        eprintln!("Error: Source directory not found: {}", paths.src_root.display());
        return ExitCode::from(EXIT_ERROR);
    }

    let pipeline = Pipeline::new(context);
    let result = pipeline.run_dev_build();
    println!("{}", result.summary());

    let reload = ReloadHandle::new();
    let _server = crate::serve::spawn(paths.out_root.clone(), config.serve.port, reload.clone());

    println!("Press Ctrl+C to stop");
    match watch::watch_and_rebuild(&pipeline, config.watch.debounce_ms, &reload) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Production pipeline: clean, build everything, abort on first failure.
fn run_build(config: ForgeConfig, project_root: PathBuf, verbose: bool) -> ExitCode {
    notifier::set_enabled(false);

    let context = PipelineContext::new(&config, &project_root).with_verbose(verbose);
    if !context.paths.src_root.exists() {
        eprintln!("Error: Source directory not found: {}", context.paths.src_root.display());
        return ExitCode::from(EXIT_ERROR);
    }

    let pipeline = Pipeline::new(context);
    match pipeline.run_production() {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Build error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
