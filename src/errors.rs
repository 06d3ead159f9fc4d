use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("daily API request limit reached; try again tomorrow")]
    QuotaExceeded,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Google API error: {status}. {message}")]
    ApiStatus { status: String, message: String },
    #[error("could not save '{path}' after {attempts} attempts")]
    Save { path: String, attempts: u32 },
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
