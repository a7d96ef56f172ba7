use crate::jsonrpc::message::{JsonRpcError, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use std::io;

/// Errors raised while running one ripgrep process.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn ripgrep: {0}")]
    Spawn(#[source] io::Error),

    #[error("ripgrep stdout not available")]
    StdoutNotAvailable,

    #[error("failed to read ripgrep output: {0}")]
    Read(#[source] io::Error),
}

impl SessionError {
    /// Message delivered to the client through `on_done`.
    pub fn user_message(&self) -> String {
        let reason = match self {
            SessionError::Spawn(e) => match e.kind() {
                io::ErrorKind::NotFound => "could not find the ripgrep (rg) binary".to_string(),
                io::ErrorKind::PermissionDenied => {
                    "could not execute the ripgrep (rg) binary".to_string()
                }
                _ => e.to_string(),
            },
            SessionError::Read(e) => e.to_string(),
            SessionError::StdoutNotAvailable => "stdout not available".to_string(),
        };
        format!("An error happened while searching ({}).", reason)
    }
}

/// Errors of the JSON-RPC surface.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Io(_) | RpcError::Json(_) => PARSE_ERROR,
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
        }
    }

    pub fn to_error_object(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}
