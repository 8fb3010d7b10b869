use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AppError {
    FileNotFound(PathBuf),
    SheetMissing(String),
    SheetRead(String),
    WriteError(String),
    ValidationError(String),
    TransportError(String),
    IoError(std::io::Error),
    ParseError(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            AppError::SheetMissing(source) => write!(f, "No sheets in workbook: {}", source),
            AppError::SheetRead(msg) => write!(f, "Failed to read sheet: {}", msg),
            AppError::WriteError(msg) => write!(f, "Write error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            AppError::IoError(err) => write!(f, "IO error: {}", err),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::ValidationError(format!("Requête multipart invalide: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Mobile client contract: 400 for caller mistakes, 500 otherwise,
        // body always carries `success` and a readable `error`.
        let (status, message, details) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::TransportError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erreur lors de l'envoi de l'email".to_string(),
                Some(msg),
            ),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string(), None),
        };

        let body = match details {
            Some(details) => Json(json!({
                "success": false,
                "error": message,
                "details": details,
            })),
            None => Json(json!({
                "success": false,
                "error": message,
            })),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let response =
            AppError::ValidationError("Format d'email invalide".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transport_errors_map_to_internal_server_error() {
        let response =
            AppError::TransportError("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
