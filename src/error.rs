use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("reading spec {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing spec {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("operation {0} not found")]
    OperationNotFound(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid query {expression}: {message}")]
    InvalidQuery { expression: String, message: String },
    #[error("serializing response: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Request {0} not found")]
    RequestNotFound(String),
    #[error("Flow {0} not found")]
    FlowNotFound(String),
    #[error("Request {request} is missing required parameters: {}", missing.join(", "))]
    MissingParameters {
        request: String,
        missing: Vec<String>,
    },
    #[error("Environment does not contain {0}")]
    VariableMissing(String),
    #[error("{0} is not an array")]
    NotAnArray(String),
    #[error("No response available")]
    NoResponse,
}
