use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::config::ConfigError;
use crate::data::LoadError;
use crate::entities::ParseError;
use crate::sheets::error::SheetsError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Load(#[from] LoadError),

    #[error("Spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("Error response: {0} {1}")]
    Response(u16, String),
}

impl From<ParseError> for AppError {
    fn from(value: ParseError) -> Self {
        AppError::Response(400, value.to_string())
    }
}

impl From<AppError> for std::io::Error {
    fn from(e: AppError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        match self {
            AppError::Response(_, message) => {
                HttpResponse::build(self.status_code()).json(json!({ "error": message }))
            }
            AppError::Load(e) => {
                log::error!("{}", e);
                HttpResponse::build(self.status_code()).json(json!({ "error": e.to_string() }))
            }
            other => {
                log::error!("{}", other);
                HttpResponse::InternalServerError().finish()
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Response(status, _) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
