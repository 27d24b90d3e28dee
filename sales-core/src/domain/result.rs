//! Result and error types for the core library

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core library error type
///
/// Row rejections during cleaning are not errors; they are counted and
/// reported on the cleaned record set.
#[derive(Error, Debug)]
pub enum Error {
    /// Source file missing, unreadable or not tabular
    #[error("Load error: {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Operation invoked out of the required order
    #[error("State error: {0}")]
    State(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Schema, write or query failure against the store
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Export error: {0}")]
    Export(String),

    /// A sum over the records exceeds the numeric range
    #[error("Overflow: {0}")]
    Overflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a load error for a source path
    pub fn load(path: &Path, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a persistence error without an underlying cause
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a persistence error that carries its cause
    pub fn persistence_with(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Create an overflow error
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Load { .. } => "load_error",
            Error::State(_) => "state_error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Persistence { .. } => "persistence_error",
            Error::Export(_) => "export_error",
            Error::Overflow(_) => "overflow",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let message = err.to_string();
        Self::persistence_with(message, err)
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("kind".to_string(), serde_json::Value::from(e.kind()));
                Self::fail_with_context(e.to_string(), context)
            }
        }
    }
}
