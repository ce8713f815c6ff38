use futures_util::future::{BoxFuture, FutureExt};

use crate::entities::DataSource;
use crate::sheets::client::SheetsClient;
use crate::sheets::entities::ValueRange;

use super::error::{DataError, DataResult};
use super::loader::TableSource;
use super::table::{RawTable, RawTables};

/// The fixed cell ranges each table is read from: one for the header row,
/// one for the data rows
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRanges {
    pub stops_header: String,
    pub stops_rows: String,
    pub students_header: String,
    pub students_rows: String,
}

impl Default for SheetRanges {
    fn default() -> Self {
        SheetRanges {
            stops_header: "bus_stops!A1:H1".to_string(),
            stops_rows: "bus_stops!A2:H".to_string(),
            students_header: "students!A1:E1".to_string(),
            students_rows: "students!A2:E".to_string(),
        }
    }
}

impl SheetRanges {
    fn all(&self) -> Vec<String> {
        vec![
            self.stops_header.clone(),
            self.stops_rows.clone(),
            self.students_header.clone(),
            self.students_rows.clone(),
        ]
    }
}

pub struct SheetsSource {
    client: SheetsClient,
    ranges: SheetRanges,
}

impl SheetsSource {
    pub fn new(client: SheetsClient, ranges: SheetRanges) -> Self {
        SheetsSource { client, ranges }
    }

    async fn read(&self) -> DataResult<RawTables> {
        let value_ranges = self.client.batch_get(&self.ranges.all()).await?;
        tables_from_ranges(&value_ranges)
    }
}

impl TableSource for SheetsSource {
    fn source(&self) -> DataSource {
        DataSource::Spreadsheet
    }

    fn fetch(&self) -> BoxFuture<'_, DataResult<RawTables>> {
        self.read().boxed()
    }
}

/// Builds both tables from the four ranges, in the order of [`SheetRanges::all`]
fn tables_from_ranges(ranges: &[ValueRange]) -> DataResult<RawTables> {
    let [stops_header, stops_rows, students_header, students_rows] = ranges else {
        return Err(DataError::Empty("spreadsheet"));
    };

    Ok(RawTables {
        stops: table_from_ranges("bus_stops", stops_header, stops_rows)?,
        students: table_from_ranges("students", students_header, students_rows)?,
    })
}

fn table_from_ranges(name: &'static str, header: &ValueRange, rows: &ValueRange) -> DataResult<RawTable> {
    let headers = header.rows().into_iter().next().unwrap_or_default();
    let rows = rows.rows();

    if headers.is_empty() || rows.is_empty() {
        return Err(DataError::Empty(name));
    }

    Ok(RawTable { headers, rows })
}
