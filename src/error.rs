//! Shared error types: AI payload contract violations, content-fetch
//! failures, game state-machine guards, and profile persistence.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Shape violations in an AI-produced payload. Decoding fails closed: any
/// deviation from the contract rejects the whole payload.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContractError {
    #[error("question text is empty")]
    EmptyQuestion,
    #[error("expected 2 to 3 choices, got {0}")]
    ChoiceCount(usize),
    #[error("choice {0} is empty")]
    EmptyChoice(usize),
    #[error("correct choice index {index} out of range for {len} choices")]
    CorrectIndexOutOfRange { index: usize, len: usize },
    #[error("feedback length {feedback} does not match choices length {choices}")]
    FeedbackMismatch { feedback: usize, choices: usize },
    #[error("unknown scenario category key '{0}'")]
    UnknownCategoryKey(String),
}

/// Failures while talking to the generative backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("API key not configured")]
    MissingKey,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("API HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model returned invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned an empty completion")]
    EmptyResponse,
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Guard violations in the session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameError {
    #[error("unknown session id '{0}'")]
    UnknownSession(String),
    #[error("operation not allowed in phase {0}")]
    WrongPhase(&'static str),
    #[error("question already answered")]
    AlreadyAnswered,
    #[error("no answer submitted yet")]
    NotAnswered,
    #[error("choice index {0} out of range")]
    InvalidChoice(usize),
    #[error("timer must be one of: none, 15, 20 or 30 seconds (got {0})")]
    InvalidTimer(u32),
    #[error("no timer configured for this session")]
    NoTimer,
    #[error("location is not configured")]
    MissingLocation,
    #[error("unknown chat contact '{0}'")]
    UnknownContact(String),
}

/// Profile store failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("invalid API key format: key must be 39 characters and start with \"AIza\"")]
    InvalidKey,
    #[error("failed to initialize the AI client")]
    ClientInit,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Error surfaced by HTTP handlers. WS handlers render the same variants as
/// an `error` message instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Game(GameError::UnknownSession(_)) => StatusCode::NOT_FOUND,
            ApiError::Game(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(FetchError::MissingKey) => StatusCode::PRECONDITION_REQUIRED,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Profile(ProfileError::InvalidKey) => StatusCode::BAD_REQUEST,
            ApiError::Profile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
