// Shared response types and error mapping

use axum::http::StatusCode;
use serde::Serialize;
use troupe_core::Error;
use utoipa::ToSchema;

/// Standard list response wrapper
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Translate domain errors to HTTP status codes:
/// 409 already-exists, 404 not-found or not-ready, 400 invalid-input,
/// 500 everything unexpected.
pub fn map_error(e: Error) -> StatusCode {
    let status = match &e {
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::NotFound(_) | Error::NotReady(_) => StatusCode::NOT_FOUND,
        Error::InvalidEvent(_) | Error::InvalidResource(_) | Error::WebhookMalformed(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {e}");
    } else {
        tracing::debug!("request rejected ({status}): {e}");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_documented_codes() {
        assert_eq!(
            map_error(Error::already_exists("agent 'x'")),
            StatusCode::CONFLICT
        );
        assert_eq!(map_error(Error::not_found("agent 'x'")), StatusCode::NOT_FOUND);
        assert_eq!(map_error(Error::not_ready("x")), StatusCode::NOT_FOUND);
        assert_eq!(
            map_error(Error::invalid_resource("cycle")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_error(Error::webhook("no repo")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_error(Error::Generic(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
