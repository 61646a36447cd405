use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("401 Unauthorized")]
    Unauthorized,

    #[error("404 Not Found")]
    NotFound,

    #[error("500 Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;

        match self {
            Unauthorized => StatusCode::UNAUTHORIZED,
            NotFound => StatusCode::NOT_FOUND,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wrap anything that can become an `anyhow::Error`.
    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Self::Internal(error.into())
    }
}

/// Carries the error to `render_view` so it can be shown in the layout.
#[derive(Clone)]
pub(crate) struct ErrorWrapper(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if let AppError::Internal(ref inner) = self {
            tracing::error!("Internal server error: {inner:#}");
        }

        let mut response = (self.status(), "").into_response();
        response
            .extensions_mut()
            .insert(ErrorWrapper(Arc::new(self)));

        response
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
