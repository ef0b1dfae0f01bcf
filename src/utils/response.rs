use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// `{success: true, data, message}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

/// `{success: false, error: {code, message, details}}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

fn respond<T: Serialize>(status: StatusCode, data: Option<T>, message: String) -> Response {
    let envelope = Envelope {
        success: true,
        data,
        message,
    };
    (status, Json(envelope)).into_response()
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    respond(StatusCode::OK, Some(data), message.into())
}

pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    respond(StatusCode::CREATED, Some(data), message.into())
}

pub fn empty_success(message: impl Into<String>) -> Response {
    respond::<()>(StatusCode::OK, None, message.into())
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let envelope = ErrorEnvelope {
        success: false,
        error: ErrorBody {
            code: code.to_string(),
            message: message.into(),
            details,
        },
    };
    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_created_envelope() {
        let response = created(serde_json::json!({ "id": 7 }), "Made");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_of(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 7);
        assert_eq!(body["message"], "Made");
    }

    #[tokio::test]
    async fn test_error_envelope_keeps_null_details() {
        let response = error("NOT_FOUND", "Seat not found", None, StatusCode::NOT_FOUND);
        let body = body_of(response).await;

        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["error"]["details"].is_null());
    }
}
