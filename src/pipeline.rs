//! Pipeline orchestration.
//!
//! Two drivers over the same four tasks (styles -> scripts -> images ->
//! markup, a fixed order for determinism):
//! - the development driver treats task failures as non-fatal and surfaces
//!   them through desktop notifications, matching watch-mode semantics
//! - the production driver cleans the output tree first and aborts on the
//!   first failure, with no notification path

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{ForgeConfig, ImagesConfig, ResolvedPaths};
use crate::notifier;
use crate::tasks::{self, TaskError};

/// The four build task categories, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Sass compilation + CSS post-processing
    Styles,
    /// Script transpilation
    Scripts,
    /// Image optimization + WebP derivatives
    Images,
    /// HTML relay
    Markup,
}

impl TaskKind {
    /// Pipeline execution order.
    pub const ORDERED: [TaskKind; 4] =
        [TaskKind::Styles, TaskKind::Scripts, TaskKind::Images, TaskKind::Markup];
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Styles => write!(f, "styles"),
            TaskKind::Scripts => write!(f, "scripts"),
            TaskKind::Images => write!(f, "images"),
            TaskKind::Markup => write!(f, "markup"),
        }
    }
}

/// Status of a single task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed
    Success,
    /// Task failed with error
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Which task ran
    pub kind: TaskKind,
    /// Outcome
    pub status: TaskStatus,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Task duration
    pub duration: Duration,
}

/// Result of a complete pipeline run.
#[derive(Debug, Default)]
pub struct PipelineResult {
    /// Per-task results, in execution order
    pub tasks: Vec<TaskResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl PipelineResult {
    /// Check if every task succeeded.
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| !t.status.is_failure())
    }

    /// Total number of files written.
    pub fn files_written(&self) -> usize {
        self.tasks.iter().map(|t| t.outputs.len()).sum()
    }

    /// Format a one-paragraph summary.
    pub fn summary(&self) -> String {
        let failed: Vec<&TaskResult> =
            self.tasks.iter().filter(|t| t.status.is_failure()).collect();
        if failed.is_empty() {
            format!(
                "Build succeeded: {} files from {} tasks in {:?}",
                self.files_written(),
                self.tasks.len(),
                self.total_duration
            )
        } else {
            let mut lines =
                vec![format!("Build failed: {} of {} tasks", failed.len(), self.tasks.len())];
            for task in failed {
                if let TaskStatus::Failed(err) = &task.status {
                    lines.push(format!("  - {}: {}", task.kind, err));
                }
            }
            lines.join("\n")
        }
    }
}

/// Everything a task run needs, resolved once up front.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Resolved source/output directories
    pub paths: ResolvedPaths,
    /// Browser support matrix
    pub browsers: Vec<String>,
    /// Image encoder settings
    pub images: ImagesConfig,
    /// Verbose output
    pub verbose: bool,
}

impl PipelineContext {
    /// Build a context from a loaded config and the project root.
    pub fn new(config: &ForgeConfig, project_root: &Path) -> Self {
        Self {
            paths: config.resolve(project_root),
            browsers: config.browsers.clone(),
            images: config.images.clone(),
            verbose: false,
        }
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// The task pipeline.
pub struct Pipeline {
    context: PipelineContext,
}

impl Pipeline {
    /// Create a pipeline over a context.
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    /// Access the context.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Run a single task, propagating its error.
    pub fn run_task(&self, kind: TaskKind) -> Result<Vec<PathBuf>, TaskError> {
        let ctx = &self.context;
        match kind {
            TaskKind::Styles => tasks::styles::compile(&ctx.paths, &ctx.browsers),
            TaskKind::Scripts => tasks::scripts::transform(&ctx.paths),
            TaskKind::Images => tasks::images::optimize(&ctx.paths, &ctx.images, ctx.verbose),
            TaskKind::Markup => tasks::markup::relay(&ctx.paths),
        }
    }

    /// Run a single task under the watch-mode error boundary: a failure is
    /// shown as a desktop notification and recorded, never propagated.
    pub fn run_task_guarded(&self, kind: TaskKind) -> TaskResult {
        let start = Instant::now();
        if self.context.verbose {
            println!("Building {} ...", kind);
        }

        match self.run_task(kind) {
            Ok(outputs) => {
                if kind == TaskKind::Styles {
                    notifier::success("Sass compiled");
                }
                TaskResult { kind, status: TaskStatus::Success, outputs, duration: start.elapsed() }
            }
            Err(e) => {
                notifier::error(&format!("webforge: {} failed", kind), &e.to_string());
                TaskResult {
                    kind,
                    status: TaskStatus::Failed(e.to_string()),
                    outputs: vec![],
                    duration: start.elapsed(),
                }
            }
        }
    }

    /// Development build: all four tasks in order, failures non-fatal.
    pub fn run_dev_build(&self) -> PipelineResult {
        let start = Instant::now();
        let mut result = PipelineResult::default();
        for kind in TaskKind::ORDERED {
            result.tasks.push(self.run_task_guarded(kind));
        }
        result.total_duration = start.elapsed();
        result
    }

    /// Production build: clean the output tree, then all four tasks in
    /// order. The first failure aborts immediately (fail-fast); no
    /// notifications are emitted.
    pub fn run_production(&self) -> Result<PipelineResult, TaskError> {
        let start = Instant::now();
        tasks::clean::clean(&self.context.paths.out_root)?;

        let mut result = PipelineResult::default();
        for kind in TaskKind::ORDERED {
            let task_start = Instant::now();
            if self.context.verbose {
                println!("Building {} ...", kind);
            }
            let outputs = self.run_task(kind)?;
            result.tasks.push(TaskResult {
                kind,
                status: TaskStatus::Success,
                outputs,
                duration: task_start.elapsed(),
            });
        }
        result.total_duration = start.elapsed();
        Ok(result)
    }
}
