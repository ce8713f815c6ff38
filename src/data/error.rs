use crate::sheets::error::SheetsError;

#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error("Spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not decode {0} as UTF-8 or Shift_JIS")]
    Encoding(String),

    #[error("Missing column '{column}' in {table} table")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("No rows in {0} table")]
    Empty(&'static str),

    #[error("No answer within {0:?}")]
    Timeout(std::time::Duration),
}

pub type DataResult<T> = Result<T, DataError>;

/// Every configured source failed
#[derive(thiserror::Error, Debug)]
#[error("No data source available: {0}")]
pub struct LoadError(pub String);

pub type LoadResult<T> = Result<T, LoadError>;
