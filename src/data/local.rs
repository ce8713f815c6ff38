use std::path::{Path, PathBuf};

use futures_util::future::{BoxFuture, FutureExt};

use crate::entities::DataSource;

use super::error::{DataError, DataResult};
use super::loader::TableSource;
use super::table::{RawTable, RawTables};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The two tables as CSV files on local disk
pub struct CsvSource {
    stops_path: PathBuf,
    students_path: PathBuf,
}

impl CsvSource {
    pub fn new(stops_path: impl Into<PathBuf>, students_path: impl Into<PathBuf>) -> Self {
        CsvSource {
            stops_path: stops_path.into(),
            students_path: students_path.into(),
        }
    }

    async fn read(&self) -> DataResult<RawTables> {
        Ok(RawTables {
            stops: read_table(&self.stops_path).await?,
            students: read_table(&self.students_path).await?,
        })
    }
}

impl TableSource for CsvSource {
    fn source(&self) -> DataSource {
        DataSource::LocalCsv
    }

    fn fetch(&self) -> BoxFuture<'_, DataResult<RawTables>> {
        self.read().boxed()
    }
}

async fn read_table(path: &Path) -> DataResult<RawTable> {
    log::debug!("Reading {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    let text = decode(&bytes).ok_or_else(|| DataError::Encoding(path.display().to_string()))?;
    parse_table(&text)
}

/// UTF-8 first, then the Windows Japanese code page
pub fn decode(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    let (text, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn parse_table(text: &str) -> DataResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = vec![];
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows })
}
