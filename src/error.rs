// src/error.rs
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::{header::LOCATION, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub const INDEX_PATH: &str = "/polls/";

// Path separators stay readable in the login `next` parameter.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown question, or an id that is not a number at all.
    #[error("Question {0} does not exist.")]
    NotFound(String),

    #[error("This question is not yet published.")]
    NotPublished,

    #[error("Voting is not allowed for this question.")]
    VotingClosed,

    #[error("Please select a choice")]
    InvalidChoice { question_id: i64 },

    #[error("Authentication required")]
    AuthenticationRequired { login_url: String, next: String },

    #[error("Not authorized to perform this action")]
    Forbidden,

    /// Missing question on the operator API; a 404 instead of a redirect.
    #[error("Question {0} does not exist.")]
    NoSuchQuestion(i64),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

/// Message shown to the user after a redirect.
#[derive(Debug, Serialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

/// 303 to `location`, carrying a user-visible message in the body.
pub fn redirect_with(location: &str, level: Level, message: impl Into<String>) -> Response {
    let flash = Flash {
        level,
        message: message.into(),
    };
    (StatusCode::SEE_OTHER, [(LOCATION, location.to_string())], Json(flash)).into_response()
}

pub fn detail_path(question_id: i64) -> String {
    format!("/polls/{question_id}/")
}

pub fn results_path(question_id: i64) -> String {
    format!("/polls/{question_id}/results/")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            AppError::NotFound(_) | AppError::NotPublished | AppError::VotingClosed => {
                redirect_with(INDEX_PATH, Level::Error, message)
            }
            AppError::InvalidChoice { question_id } => {
                redirect_with(&detail_path(question_id), Level::Error, message)
            }
            AppError::AuthenticationRequired { login_url, next } => {
                let next = utf8_percent_encode(&next, NEXT_ENCODE_SET);
                let location = format!("{login_url}?next={next}");
                redirect_with(&location, Level::Error, message)
            }
            AppError::Forbidden => {
                (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": message }))).into_response()
            }
            AppError::NoSuchQuestion(_) => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": message }))).into_response()
            }
            AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message }))).into_response()
            }
            AppError::Database(e) => {
                error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(response: &Response) -> &str {
        response.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    #[test]
    fn eligibility_errors_redirect_to_index() {
        for err in [AppError::NotFound("7".to_string()), AppError::NotPublished, AppError::VotingClosed] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), INDEX_PATH);
        }
    }

    #[test]
    fn invalid_choice_redirects_to_detail() {
        let response = AppError::InvalidChoice { question_id: 3 }.into_response();
        assert_eq!(location(&response), "/polls/3/");
    }

    #[test]
    fn login_redirect_keeps_return_path() {
        let response = AppError::AuthenticationRequired {
            login_url: "/accounts/login/".to_string(),
            next: "/polls/3/vote/".to_string(),
        }
        .into_response();
        assert_eq!(location(&response), "/accounts/login/?next=/polls/3/vote/");
    }

    #[test]
    fn login_redirect_encodes_return_path() {
        let response = AppError::AuthenticationRequired {
            login_url: "/accounts/login/".to_string(),
            next: "/admin/questions/a b&x=1?y".to_string(),
        }
        .into_response();
        assert_eq!(
            location(&response),
            "/accounts/login/?next=/admin/questions/a%20b%26x%3D1%3Fy"
        );
    }

    #[test]
    fn database_errors_are_opaque() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
