use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamService {
    Ticketing,
    LanguageModel,
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticketing => f.write_str("ticketing api"),
            Self::LanguageModel => f.write_str("language model api"),
        }
    }
}

/// Failure talking to one of the external HTTP collaborators.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    Transport { service: UpstreamService, message: String },
    #[error("{service} request timed out after {after_secs}s")]
    Timeout { service: UpstreamService, after_secs: u64 },
    #[error("{service} returned HTTP {status}: {body}")]
    Status { service: UpstreamService, status: u16, body: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: UpstreamService, message: String },
}

impl UpstreamError {
    pub fn service(&self) -> UpstreamService {
        match self {
            Self::Transport { service, .. }
            | Self::Timeout { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. } => *service,
        }
    }

    /// Short detail suitable for embedding in a transcript message.
    pub fn user_detail(&self) -> String {
        match self {
            Self::Status { status, .. } => format!("{} returned HTTP {status}", self.service()),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow exceeded the step limit of {limit}")]
    StepLimitExceeded { limit: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}
