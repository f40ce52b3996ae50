//! 统一 API 响应格式
//!
//! 成功响应：{ code: 0, message: "success", data }
//! 错误响应由 AppError 输出：{ code: "error_code", message, trace_id? }

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data,
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// 将数据包装为统一响应格式
pub fn success_response<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// 201 Created + 统一响应格式
pub fn created_response<T: Serialize>(
    data: T,
) -> Result<(StatusCode, Json<ApiResponse<T>>), AppError> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::success(serde_json::json!({"ok": true})))
            .unwrap();
        assert_eq!(body["code"], 0);
        assert_eq!(body["message"], "success");
        assert_eq!(body["data"]["ok"], true);
    }
}
