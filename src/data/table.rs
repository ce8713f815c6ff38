use std::collections::HashMap;

use chrono::Utc;

use crate::entities::{BusStop, DataSource, Snapshot, Student};

use super::error::{DataError, DataResult};

/// Literals left behind by missing-value handling upstream
const MISSING_LITERALS: [&str; 2] = ["nan", "None"];

const STOPS_TABLE: &str = "bus_stops";
const STUDENTS_TABLE: &str = "students";

/// A table as text cells, before any typing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTables {
    pub stops: RawTable,
    pub students: RawTable,
}

impl RawTables {
    pub fn into_snapshot(self, source: DataSource) -> DataResult<Snapshot> {
        Ok(Snapshot {
            stops: self.stops.into_stops()?,
            students: self.students.into_students()?,
            source,
            loaded_at: Utc::now(),
        })
    }
}

pub fn normalize_cell(cell: &str) -> String {
    let cell = cell.trim();
    if MISSING_LITERALS.contains(&cell) {
        String::new()
    } else {
        cell.to_string()
    }
}

fn parse_coordinate(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_sequence(cell: &str) -> Option<u32> {
    // spreadsheets hand integers back as "3.0" when the column is numeric
    let cell = cell.strip_suffix(".0").unwrap_or(cell);
    cell.parse().ok()
}

fn non_empty(cell: String) -> Option<String> {
    (!cell.is_empty()).then_some(cell)
}

/// Header name to column index lookup
struct Columns {
    table: &'static str,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(table: &'static str, headers: &[String]) -> Self {
        let mut index = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // first occurrence wins
            index
                .entry(normalize_cell(header).to_lowercase())
                .or_insert(i);
        }
        Columns { table, index }
    }

    fn required(&self, column: &'static str) -> DataResult<usize> {
        self.optional(column).ok_or(DataError::MissingColumn {
            table: self.table,
            column,
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

/// Normalised cell text; short rows read as empty cells
fn cell(row: &[String], column: Option<usize>) -> String {
    column
        .and_then(|i| row.get(i))
        .map(|c| normalize_cell(c))
        .unwrap_or_default()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| normalize_cell(c).is_empty())
}

impl RawTable {
    pub fn into_stops(self) -> DataResult<Vec<BusStop>> {
        let columns = Columns::new(STOPS_TABLE, &self.headers);
        let route = Some(columns.required("route")?);
        let stop_name = Some(columns.required("stop_name")?);
        let sequence = columns.optional("sequence");
        let lat = columns.optional("lat");
        let lng = columns.optional("lng");
        let time_to = columns.optional("time_to");
        let time_from = columns.optional("time_from");
        let schedule_type = columns.optional("schedule_type");

        let stops = self
            .rows
            .iter()
            .filter(|row| !is_blank(row))
            .map(|row| BusStop {
                route: cell(row, route),
                stop_name: cell(row, stop_name),
                sequence: parse_sequence(&cell(row, sequence)),
                lat: parse_coordinate(&cell(row, lat)),
                lng: parse_coordinate(&cell(row, lng)),
                time_to: cell(row, time_to),
                time_from: cell(row, time_from),
                schedule_type: non_empty(cell(row, schedule_type)),
            })
            .collect();

        Ok(stops)
    }

    pub fn into_students(self) -> DataResult<Vec<Student>> {
        let columns = Columns::new(STUDENTS_TABLE, &self.headers);
        let name = Some(columns.required("name")?);
        let route = Some(columns.required("route")?);
        let stop_name = Some(columns.required("stop_name")?);
        let direction = columns.optional("direction");
        let department = columns.optional("department");

        let students = self
            .rows
            .iter()
            .filter(|row| !is_blank(row))
            .map(|row| Student {
                name: cell(row, name),
                route: cell(row, route),
                stop_name: cell(row, stop_name),
                direction: cell(row, direction),
                department: non_empty(cell(row, department)),
            })
            .collect();

        Ok(students)
    }
}
