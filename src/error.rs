use camino::Utf8PathBuf;
use thiserror::Error;

pub use anyhow::Error as RuntimeError;

/// Result of a single task or per-file action.
pub type TaskResult<T = ()> = anyhow::Result<T, anyhow::Error>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is already running")]
    AlreadyRunning,

    #[error("Queue has already completed and cannot run again")]
    AlreadyCompleted,

    #[error("Cannot add task '{0}' after the queue was started")]
    Sealed(String),

    #[error("Task '{0}' dropped its continuation without completing")]
    Abandoned(String),

    #[error("Task '{name}':\n{source}")]
    Task {
        name: String,
        #[source]
        source: RuntimeError,
    },
}

/// A failure reported by an external tool (transpiler, minifier, ...).
#[derive(Debug, Error)]
#[error("{tool}: {source}")]
pub struct CollaboratorError {
    pub tool: &'static str,
    #[source]
    pub source: RuntimeError,
}

impl CollaboratorError {
    pub fn new(tool: &'static str, err: impl Into<anyhow::Error>) -> Self {
        Self {
            tool,
            source: err.into(),
        }
    }
}

/// A single sibling that failed inside a stage.
#[derive(Debug)]
pub struct FileFailure {
    pub path: Utf8PathBuf,
    pub error: RuntimeError,
}

/// Raised after the join when one or more siblings of a stage failed.
#[derive(Debug, Error)]
pub struct StageError {
    pub stage: String,
    /// Failures in issue order, never empty.
    pub failures: Vec<FileFailure>,
}

impl StageError {
    /// The earliest failure in issue order.
    pub fn first(&self) -> Option<&FileFailure> {
        self.failures.first()
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stage '{}' failed", self.stage)?;

        if let Some(first) = self.first() {
            write!(
                f,
                " for {} file(s), first '{}':\n{:#}",
                self.failures.len(),
                first.path,
                first.error
            )?;
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse '{0}'.\n{1}")]
    Parse(Utf8PathBuf, serde_json::Error),

    #[error("Couldn't compile glob pattern '{0}'.\n{1}")]
    Pattern(String, glob::PatternError),
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Invalid configuration:\n{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("Error while running the build.\n{0}")]
    Queue(#[from] QueueError),

    #[error("Failed to build runtime")]
    Runtime(#[source] std::io::Error),
}
