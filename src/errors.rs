use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::models::game::GameError;
use crate::models::grid::GridError;

// Custom Errors used in handlers
#[derive(Debug)]
pub enum CustomError {
    BadRequest,
    InternalServerError,
    Unauthenticated,
    InvalidToken,
    UserNotFound,
    UserExists,
    InvalidUsername,
    InvalidPassword,
    WrongPassword,
    GameNotFound,
    GameNotOpen,
    GameNotActive,
    GameCompleted,
    GameFull,
    SelfPlay,
    NotAPlayer,
    NotYourTurn,
    BadFleet,
    PlacementLocked,
    OutOfBounds,
    CellAlreadyTargeted,
    StaleGame,
}

//implementation of custom errors that are used in handlers
impl IntoResponse for CustomError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Self::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            Self::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "No token provided"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Token is not valid"),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            Self::UserExists => (StatusCode::CONFLICT, "Username already exists"),
            Self::InvalidUsername => (StatusCode::BAD_REQUEST, "Username must be 3-20 characters long and only contain letters and numbers"),
            Self::InvalidPassword => (StatusCode::BAD_REQUEST, "Password must be at least 6 characters long and both passwords must match"),
            Self::WrongPassword => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            Self::GameNotFound => (StatusCode::NOT_FOUND, "Game not found"),
            Self::GameNotOpen => (StatusCode::BAD_REQUEST, "Game is not open for joining"),
            Self::GameNotActive => (StatusCode::BAD_REQUEST, "Game is not active"),
            Self::GameCompleted => (StatusCode::BAD_REQUEST, "Game is already completed"),
            Self::GameFull => (StatusCode::CONFLICT, "Game already has two players"),
            Self::SelfPlay => (StatusCode::CONFLICT, "You cannot play against yourself"),
            Self::NotAPlayer => (StatusCode::FORBIDDEN, "You are not part of this game"),
            Self::NotYourTurn => (StatusCode::FORBIDDEN, "Not your turn"),
            Self::BadFleet => (StatusCode::BAD_REQUEST, "Grid does not contain the required fleet"),
            Self::PlacementLocked => (StatusCode::CONFLICT, "Ships cannot be moved once shots were fired"),
            Self::OutOfBounds => (StatusCode::BAD_REQUEST, "Coordinates are out of range"),
            Self::CellAlreadyTargeted => (StatusCode::CONFLICT, "Cell already targeted"),
            Self::StaleGame => (StatusCode::CONFLICT, "Game was modified concurrently, fetch it again"),
        };
        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

// Engine failures map onto the taxonomy above so handlers can use `?`
impl From<GameError> for CustomError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::GameNotOpen => Self::GameNotOpen,
            GameError::GameNotActive => Self::GameNotActive,
            GameError::GameCompleted => Self::GameCompleted,
            GameError::GameFull => Self::GameFull,
            GameError::SelfPlay => Self::SelfPlay,
            GameError::NotAPlayer => Self::NotAPlayer,
            GameError::NotYourTurn => Self::NotYourTurn,
            GameError::PlacementLocked => Self::PlacementLocked,
            GameError::Grid(GridError::OutOfBounds) => Self::OutOfBounds,
            GameError::Grid(GridError::AlreadyTargeted) => Self::CellAlreadyTargeted,
            GameError::Grid(GridError::BadFleet) => Self::BadFleet,
            GameError::Grid(GridError::Overlap) => Self::BadRequest,
        }
    }
}
