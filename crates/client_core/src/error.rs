use reqwest::StatusCode;
use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failure of a single gateway call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: String,
        status: StatusCode,
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("remote gateway unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn from_api_error(endpoint: impl Into<String>, status: StatusCode, body: ApiError) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            code: Some(body.code),
            message: body.message,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Status { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. } if *status == StatusCode::CONFLICT
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl StoreError {
    pub fn duplicate_project_name(name: &str) -> Self {
        Self::Validation(format!("a project named '{name}' already exists"))
    }

    pub fn project_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "project",
            id: id.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
