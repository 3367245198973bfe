use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

use crate::lifecycle::Rejection;

/// Codes below 100 are internal failures and are never shown to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code: i32,
    #[serde(rename = "detail")]
    pub message: String,
}

impl Error {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn env_var_error(name: &str) -> Self {
        Self::new(1, format!("environment variable error: {}", name))
    }

    pub fn database_error<T: Debug>(err: T) -> Self {
        tracing::error!("database error: {:?}", err);
        Self::new(2, "database error")
    }

    pub fn network_error<T: Debug>(err: T) -> Self {
        tracing::warn!("network error: {:?}", err);
        Self::new(3, "Network failure, please try again")
    }

    pub fn upstream_error() -> Self {
        Self::new(4, "Unexpected response from server")
    }

    pub fn unexpected_error() -> Self {
        Self::new(5, "unexpected error")
    }

    pub fn authorizor_error<T: Debug>(err: T) -> Self {
        tracing::error!("authorizor error: {:?}", err);
        Self::new(6, "authorizor error")
    }

    pub fn invalid_state_error(message: impl Into<String>) -> Self {
        Self::new(100, message)
    }

    pub fn invalid_input_error(message: impl Into<String>) -> Self {
        Self::new(101, message)
    }

    pub fn unauthenticated_error(message: impl Into<String>) -> Self {
        Self::new(102, message)
    }

    pub fn unauthorized_error(message: impl Into<String>) -> Self {
        Self::new(103, message)
    }

    pub fn not_found_error(message: impl Into<String>) -> Self {
        Self::new(104, message)
    }

    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }

    pub fn is_network_error(&self) -> bool {
        self.code == 3
    }

    pub fn is_invalid_state_error(&self) -> bool {
        self.code == 100
    }

    pub fn is_invalid_input_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_unauthenticated_error(&self) -> bool {
        self.code == 102
    }

    pub fn is_unauthorized_error(&self) -> bool {
        self.code == 103
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == 104
    }

    pub fn status_code(&self) -> StatusCode {
        match self.code {
            1..=99 => StatusCode::INTERNAL_SERVER_ERROR,
            102 => StatusCode::UNAUTHORIZED,
            103 => StatusCode::FORBIDDEN,
            104 => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        Self::env_var_error(&err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::network_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        Self::authorizor_error(err)
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        Self::unauthenticated_error("Could not validate credentials")
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NotPermitted(_) => Self::unauthorized_error(rejection.to_string()),
            Rejection::InvalidAmount => Self::invalid_input_error(rejection.to_string()),
            _ => Self::invalid_state_error(rejection.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match self.is_internal() {
            true => "Internal Server Error",
            false => self.message.as_str(),
        };

        let body = Json(json!({
            "code": self.code,
            "detail": detail,
        }));

        (status, body).into_response()
    }
}

#[test]
fn internal_errors_hide_their_message() {
    let response = Error::database_error("connection reset").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = Error::invalid_state_error("Request is not pending").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = Error::unauthorized_error("Admin access required").into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn rejection_maps_to_error_kind() {
    use crate::lifecycle::Rejection;

    let err: Error = Rejection::InvalidAmount.into();
    assert!(err.is_invalid_input_error());

    let err: Error = Rejection::AlreadyAssigned.into();
    assert!(err.is_invalid_state_error());
    assert_eq!(err.message, Rejection::AlreadyAssigned.to_string());
}
