use axum::{http::StatusCode, Json};
use serde::Serialize;
use validator::Validate;

use crate::{errors::ServiceError, ApiResponse};

pub fn success_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn no_content_response() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(Into::into)
}

/// Splits a comma-separated query value into trimmed, non-empty parts.
pub fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_handles_blanks_and_spaces() {
        assert_eq!(split_csv(Some("red, blue ,,green")), vec!["red", "blue", "green"]);
        assert!(split_csv(Some("  ")).is_empty());
        assert!(split_csv(None).is_empty());
    }
}
