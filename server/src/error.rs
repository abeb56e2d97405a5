use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openpath_data_management::DataManagerError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Forbidden,
    BadRequest(String),
    Internal,
}

impl From<DataManagerError> for ApiError {
    fn from(err: DataManagerError) -> Self {
        match err {
            DataManagerError::InvalidInput(message) => ApiError::BadRequest(message),
            err => {
                tracing::error!("Request failed: {err}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "not permitted for this study".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
