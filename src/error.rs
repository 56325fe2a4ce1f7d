use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThesisBuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("{path} already exists. Use --force to overwrite.")]
    ManifestExists { path: String },

    #[error("Stylesheet not found: {path}")]
    StylesheetMissing { path: String },

    #[error("No content to build: {reason}")]
    NoContent { reason: String },

    #[error("External tool '{tool}' is not installed or not on PATH")]
    ToolMissing { tool: String },

    #[error("External tool '{tool}' failed ({status}):\n{stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Compilation error: {reason}")]
    Compilation { reason: String },

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ThesisBuildError>;
