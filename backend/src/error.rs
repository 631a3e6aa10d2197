use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::cache::result_cache::CacheError;
use crate::dataset::csv_table::DatasetError;
use crate::report::ReportError;
use crate::storage::temp_storage::StorageError;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Handler-boundary error; every variant renders as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        log::error!("Blocking task failed: {:?}", err);
        ApiError::Internal("Internal worker failure".to_string())
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::CacheMiss => ApiError::BadRequest(err.to_string()),
            CacheError::Poisoned => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::MissingName | DatasetError::InvalidName(_) => {
                ApiError::BadRequest(err.to_string())
            }
            DatasetError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileTooLarge { .. } | StorageError::InvalidName(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(format!("Failed to process the uploaded file: {}", err)),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        log::error!("Report generation failed: {}", err);
        match err {
            ReportError::MissingSource(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Internal(format!("Internal error while generating the PDF: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_variant() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DatasetError::NotFound("a.csv".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CacheError::CacheMiss).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::FileTooLarge { size: 10, max: 5 }).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
