//! Error type shared by every deployment operation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeployError>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("root privileges required to {0}; re-run with sudo")]
    NotPrivileged(String),

    #[error("`{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown verb `{0}`")]
    UnknownVerb(String),

    #[error("unknown service `{name}` (known: {known})")]
    UnknownService { name: String, known: String },

    #[error("invalid service definition `{name}`: {reason}")]
    InvalidService { name: String, reason: String },

    #[error("source tree {} does not contain {entry}", .root.display())]
    MissingSource { root: PathBuf, entry: String },

    #[error("ExecStart program {} is missing or not executable", .0.display())]
    ExecStartMissing(PathBuf),

    #[error("invalid install manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DeployError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| DeployError::Io { action, path, source }
    }
}
