use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};

pub const TO_SCHOOL_MARKER: &str = "登校";
pub const FROM_SCHOOL_MARKER: &str = "下校";

/// A stop on a route, as read from the bus stop table.
///
/// Identity is `(route, stop_name)`, but duplicates are kept as they appear.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BusStop {
    pub route: String,
    pub stop_name: String,
    pub sequence: Option<u32>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Scheduled time of the morning (登校) trip
    pub time_to: String,
    /// Scheduled time of the afternoon (下校) trip
    pub time_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<String>,
}

impl BusStop {
    /// The stop position, only when both latitude and longitude are usable
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Student {
    pub name: String,
    pub route: String,
    pub stop_name: String,
    /// Raw direction text, e.g. "登校", "下校" or "登校・下校"
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl Student {
    pub fn directions(&self) -> Directions {
        Directions::parse(&self.direction)
    }

    /// Single character shown next to the name when all directions are listed
    pub fn direction_marker(&self) -> Option<char> {
        self.direction.chars().next()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToSchool,
    FromSchool,
}

impl Direction {
    pub fn marker(&self) -> &'static str {
        match self {
            Direction::ToSchool => TO_SCHOOL_MARKER,
            Direction::FromSchool => FROM_SCHOOL_MARKER,
        }
    }
}

/// The set of trips a student is assigned to at a stop
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directions {
    pub to_school: bool,
    pub from_school: bool,
}

impl Directions {
    pub fn parse(text: &str) -> Self {
        Directions {
            to_school: text.contains(TO_SCHOOL_MARKER),
            from_school: text.contains(FROM_SCHOOL_MARKER),
        }
    }

    pub fn contains(&self, direction: Direction) -> bool {
        match direction {
            Direction::ToSchool => self.to_school,
            Direction::FromSchool => self.from_school,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirectionFilter {
    ToSchool,
    FromSchool,
    #[default]
    All,
}

impl DirectionFilter {
    pub fn accepts(&self, student: &Student) -> bool {
        match self {
            DirectionFilter::ToSchool => student.directions().contains(Direction::ToSchool),
            DirectionFilter::FromSchool => student.directions().contains(Direction::FromSchool),
            DirectionFilter::All => true,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Unknown value: {0}")]
pub struct ParseError(pub String);

impl FromStr for DirectionFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "to_school" | TO_SCHOOL_MARKER => Ok(DirectionFilter::ToSchool),
            "from_school" | FROM_SCHOOL_MARKER => Ok(DirectionFilter::FromSchool),
            "" | "all" | "全て" => Ok(DirectionFilter::All),
            other => Err(ParseError(other.to_string())),
        }
    }
}

/// A route name split into its base line and an optional direction suffix,
/// so "府内便" and "府内便（登校）" are recognised as the same line
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct RouteName {
    pub base: String,
    pub variant: Option<Direction>,
}

impl RouteName {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();

        for direction in [Direction::ToSchool, Direction::FromSchool] {
            let marker = direction.marker();
            for (open, close) in [("（", "）"), ("(", ")")] {
                let suffix = format!("{open}{marker}{close}");
                if let Some(base) = name.strip_suffix(&suffix) {
                    return RouteName {
                        base: base.trim_end().to_string(),
                        variant: Some(direction),
                    };
                }
            }
        }

        RouteName {
            base: name.to_string(),
            variant: None,
        }
    }

    /// Same base line, and no conflicting direction suffix
    pub fn matches(&self, other: &RouteName) -> bool {
        if self.base != other.base {
            return false;
        }
        match (self.variant, other.variant) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(direction) => write!(f, "{}（{}）", self.base, direction.marker()),
            None => write!(f, "{}", self.base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSelection {
    All,
    Route(RouteName),
}

impl RouteSelection {
    pub fn from_query(route: Option<&str>) -> Self {
        match route.map(str::trim) {
            None | Some("") => RouteSelection::All,
            Some(r) if r.eq_ignore_ascii_case("all") || r == "全便" => RouteSelection::All,
            Some(r) => RouteSelection::Route(RouteName::parse(r)),
        }
    }

    pub fn includes(&self, route: &str) -> bool {
        match self {
            RouteSelection::All => true,
            RouteSelection::Route(selected) => selected.matches(&RouteName::parse(route)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Coordinate { lat, lng })
    }
}

impl From<Coordinate> for Point {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Spreadsheet,
    LocalCsv,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Spreadsheet => write!(f, "spreadsheet"),
            DataSource::LocalCsv => write!(f, "local csv"),
        }
    }
}

/// Both tables as loaded together from one source
#[derive(Debug, Serialize, Clone)]
pub struct Snapshot {
    pub stops: Vec<BusStop>,
    pub students: Vec<Student>,
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NearestStop<'a> {
    pub stop: &'a BusStop,
    pub distance_meters: f64,
}
