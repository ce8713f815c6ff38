mod error;
mod loader;
mod local;
mod sheets;
mod table;

pub use error::{DataError, DataResult, LoadError};
pub use loader::{DataLoader, TableSource};
pub use local::CsvSource;
pub use sheets::{SheetRanges, SheetsSource};
pub use table::{RawTable, RawTables};
