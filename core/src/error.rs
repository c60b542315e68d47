use serde::Serialize;
use serde_json::{Value, json};

/// Structured error payload returned inside a tool-call envelope.
/// Carries enough detail for the calling agent to correct the call.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    /// Machine-readable error code (see [`codes`])
    pub error: &'static str,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which argument caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Upstream status/body or transport cause (gateway errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error codes surfaced to calling agents
pub mod codes {
    pub const CONFIGURATION_ERROR: &str = "configuration_error";
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const GATEWAY_ERROR: &str = "gateway_error";
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Missing credential (fatal at startup) or missing dashboard base URL
    /// (per call).
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    Validation { field: String, message: String },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Upstream answered with a non-2xx status.
    #[error("Common Room API returned HTTP {status}: {body}")]
    Status { status: u16, body: Value },
    /// DNS, connect, timeout, reset or body read failure.
    #[error("Failed to reach Common Room API: {message}")]
    Transport { message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => codes::CONFIGURATION_ERROR,
            Error::Validation { .. } => codes::VALIDATION_ERROR,
            Error::UnknownTool(_) => codes::UNKNOWN_TOOL,
            Error::Gateway(_) => codes::GATEWAY_ERROR,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        let details = match self {
            Error::Gateway(GatewayError::Status { status, body }) => Some(json!({
                "status": status,
                "body": body,
            })),
            Error::Gateway(GatewayError::Transport { message }) => Some(json!({
                "transport": message,
            })),
            Error::UnknownTool(name) => Some(json!({ "tool": name })),
            _ => None,
        };
        ErrorPayload {
            error: self.code(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
            details,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.payload()).unwrap_or_else(|_| {
            json!({
                "error": self.code(),
                "message": self.to_string(),
            })
        })
    }
}
