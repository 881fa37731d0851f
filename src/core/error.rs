//! YM-000: Error taxonomy shared by the whole core.
//!
//! Configuration errors abort immediately. Command failures carry the
//! exit code the process should terminate with. `CannotLinearize` never
//! reaches the user: the driver recovers from it with a topological sort.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while loading, expanding or building.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No recipe matches a requested target and no file exists on disk
    #[error("No recipe to build {target}")]
    NoRecipe { target: String },

    /// Cookbook content is inconsistent with the requested build
    #[error("{0}")]
    Config(String),

    /// The topological fallback found a genuine cycle
    #[error("Cyclic dependencies detected. Cowardly aborting...")]
    CyclicDependencies,

    /// The C3 merge has no consistent order for the graph
    #[error("Cannot compute c3_sort")]
    CannotLinearize,

    /// Malformed template expression
    #[error("template error in `{template}`: {reason}")]
    Template { template: String, reason: String },

    /// A bare `${name}` reference to a variable that is not bound
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    /// A value of the wrong shape reached an evaluator or a function
    #[error("{0}")]
    Type(String),

    /// `$((name ...))` with a name missing from the function registry
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// The cookbook asks for a newer tool than the running one
    #[error("This cookbook requires an yamk >= v{required}")]
    VersionTooOld { required: String },

    /// Filesystem failure with the offending path
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cookbook could not be deserialized
    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The shell could not be spawned at all
    #[error("failed to spawn `{shell}`: {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// A build command kept failing after all retries
    #[error("`{command}` failed with exit code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn template(template: &str, reason: impl Into<String>) -> Self {
        Self::Template {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}
