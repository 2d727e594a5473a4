use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::users::repo::StoreError;

pub type AccountResult<T> = Result<T, AccountError>;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("User {0} not found.")]
    NotFound(Uuid),

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Your account is inactive. Please contact the administrator.")]
    AccountInactive,

    #[error("Missing, invalid or revoked access token.")]
    Unauthorized,

    #[error("{0}")]
    BatchAborted(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(vec![msg.into()])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidCredentials
            | Self::AccountInactive
            | Self::BatchAborted(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %format!("{:#}", self), "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
