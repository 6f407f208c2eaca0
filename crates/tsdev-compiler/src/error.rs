use thiserror::Error;

use crate::paths::SourcePath;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to transform {path}: {message}")]
    Transform { path: SourcePath, message: String },

    #[error("{path} has no compiled output: ignored by pattern `{pattern}`")]
    MissingDestination { path: SourcePath, pattern: String },

    #[error("{path} is outside the project tree")]
    OutsideProject { path: SourcePath },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
