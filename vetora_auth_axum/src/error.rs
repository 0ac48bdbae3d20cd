use axum::response::Json;
use http::StatusCode;
use serde_json::{Value, json};

use vetora_auth::{
    BiometricError, CoordinationError, OAuth2Error, TokenError, UserError, WalletError,
};

/// Standard error payload: `{"success": false, "message": "..."}`.
pub(crate) fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({
        "success": false,
        "message": message.into(),
    }))
}

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, Json<Value>)>;
}

/// Implementation for CoordinationError to map variants to appropriate status codes
impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, Json<Value>)> {
        self.map_err(|e| {
            let status = status_for(&e);
            (status, error_body(e.to_string()))
        })
    }
}

fn status_for(e: &CoordinationError) -> StatusCode {
    match e {
        CoordinationError::Unauthorized => StatusCode::UNAUTHORIZED,
        CoordinationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoordinationError::Conflict(_) => StatusCode::CONFLICT,
        CoordinationError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
        CoordinationError::BiometricError(e) => match e {
            BiometricError::Authentication(_) | BiometricError::Verification(_) => {
                StatusCode::UNAUTHORIZED
            }
            BiometricError::NotFound(_) | BiometricError::NotRegistered => StatusCode::NOT_FOUND,
            BiometricError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        },
        CoordinationError::TokenError(e) => match e {
            TokenError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        },
        CoordinationError::OAuth2Error(e) => match e {
            OAuth2Error::MissingClaim(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        },
        CoordinationError::WalletError(e) => match e {
            WalletError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WalletError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        },
        CoordinationError::UserError(e) => match e {
            UserError::Duplicate(_) => StatusCode::CONFLICT,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::InvalidData(_) => StatusCode::BAD_REQUEST,
            UserError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_401() {
        let result: Result<(), CoordinationError> = Err(CoordinationError::Unauthorized);
        let err = result.into_response_error().unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_already_registered_maps_to_400() {
        let result: Result<(), CoordinationError> = Err(CoordinationError::BiometricError(
            BiometricError::AlreadyRegistered,
        ));
        let err = result.into_response_error().unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let result: Result<(), CoordinationError> = Err(CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: "123".to_string(),
        });
        let err = result.into_response_error().unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let result: Result<(), CoordinationError> =
            Err(CoordinationError::Conflict("Email already registered".to_string()));
        let err = result.into_response_error().unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_revoked_token_maps_to_401() {
        let result: Result<(), CoordinationError> =
            Err(CoordinationError::TokenError(TokenError::Revoked));
        let err = result.into_response_error().unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_error_body_shape() {
        let result: Result<(), CoordinationError> = Err(CoordinationError::Unauthorized);
        let (_, Json(body)) = result.into_response_error().unwrap_err();
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[test]
    fn test_success_case_passes_through() {
        let result: Result<String, CoordinationError> = Ok("Success".to_string());
        let value = result.into_response_error().expect("Should pass through");
        assert_eq!(value, "Success");
    }
}
