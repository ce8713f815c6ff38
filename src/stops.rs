use itertools::Itertools;
use serde::Serialize;

use crate::entities::{BusStop, DirectionFilter, RouteName, RouteSelection, Snapshot, Student};
use crate::utils::fold_width;

pub const NAME_SEPARATOR: &str = "，";
pub const NO_STUDENTS_PLACEHOLDER: &str = "該当なし";
pub const FOCUS_MARKER: &str = "📍 ";

/// How a stop without any matching students is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyStudents {
    /// An empty string
    #[default]
    Blank,
    /// The "該当なし" text some older screens used
    Placeholder,
}

impl EmptyStudents {
    fn text(&self) -> &'static str {
        match self {
            EmptyStudents::Blank => "",
            EmptyStudents::Placeholder => NO_STUDENTS_PLACEHOLDER,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub empty: EmptyStudents,
    /// Student to highlight
    pub focus: Option<String>,
}

/// One line of the stop listing
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StopRow {
    pub route: String,
    pub stop_name: String,
    /// Stop name as displayed, marked when it holds the focused student
    pub label: String,
    pub sequence: Option<u32>,
    pub time_to: String,
    pub time_from: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub students: String,
    pub student_count: usize,
    pub focused: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct RouteSummary {
    pub name: String,
    #[serde(flatten)]
    pub route: RouteName,
    pub stop_count: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct StudentMatch<'a> {
    pub student: &'a Student,
    pub stop: Option<&'a BusStop>,
}

/// Whether `student` is assigned to `stop`, ignoring direction
fn assigned_to(student: &Student, stop: &BusStop) -> bool {
    student.stop_name == stop.stop_name
        && RouteName::parse(&student.route).matches(&RouteName::parse(&stop.route))
}

fn same_name(a: &str, b: &str) -> bool {
    fold_width(a) == fold_width(b)
}

/// Stops of `route` in display order: by sequence where there is one, the
/// rest after in table order
fn route_stops<'a>(stops: &'a [BusStop], route: &str) -> Vec<&'a BusStop> {
    stops
        .iter()
        .filter(|s| s.route == route)
        .sorted_by_key(|s| (s.sequence.is_none(), s.sequence))
        .collect()
}

pub fn students_at<'a>(
    stop: &'a BusStop,
    students: &'a [Student],
    direction: DirectionFilter,
) -> impl Iterator<Item = &'a Student> + 'a {
    students
        .iter()
        .filter(move |s| assigned_to(s, stop) && direction.accepts(s))
}

fn display_name(student: &Student, direction: DirectionFilter, focus: Option<&str>) -> String {
    let mut name = student.name.clone();

    if focus.is_some_and(|f| same_name(f, &student.name)) {
        name = format!("**{}**", name);
    }

    if direction == DirectionFilter::All {
        if let Some(marker) = student.direction_marker() {
            name = format!("{}（{}）", name, marker);
        }
    }

    name
}

fn stop_row(stop: &BusStop, students: &[Student], direction: DirectionFilter, options: &JoinOptions) -> StopRow {
    let focus = options.focus.as_deref().filter(|f| !f.trim().is_empty());
    let matched = students_at(stop, students, direction).collect::<Vec<_>>();

    let focused = focus.is_some_and(|f| matched.iter().any(|s| same_name(f, &s.name)));

    let names = if matched.is_empty() {
        options.empty.text().to_string()
    } else {
        matched
            .iter()
            .map(|s| display_name(s, direction, focus))
            .join(NAME_SEPARATOR)
    };

    let label = if focused {
        format!("{}{}", FOCUS_MARKER, stop.stop_name)
    } else {
        stop.stop_name.clone()
    };

    StopRow {
        route: stop.route.clone(),
        stop_name: stop.stop_name.clone(),
        label,
        sequence: stop.sequence,
        time_to: stop.time_to.clone(),
        time_from: stop.time_from.clone(),
        lat: stop.lat,
        lng: stop.lng,
        students: names,
        student_count: matched.len(),
        focused,
    }
}

/// The stop listing for one route (or all of them) with the names of the
/// students boarding at each stop in the chosen direction
pub fn stops_with_students(
    snapshot: &Snapshot,
    selection: &RouteSelection,
    direction: DirectionFilter,
    options: &JoinOptions,
) -> Vec<StopRow> {
    snapshot
        .stops
        .iter()
        .map(|s| s.route.as_str())
        .unique()
        .filter(|route| selection.includes(route))
        .flat_map(|route| route_stops(&snapshot.stops, route))
        .map(|stop| stop_row(stop, &snapshot.students, direction, options))
        .collect()
}

/// Distinct routes in table order
pub fn routes(snapshot: &Snapshot) -> Vec<RouteSummary> {
    snapshot
        .stops
        .iter()
        .map(|s| s.route.as_str())
        .unique()
        .map(|name| RouteSummary {
            name: name.to_string(),
            route: RouteName::parse(name),
            stop_count: snapshot.stops.iter().filter(|s| s.route == name).count(),
        })
        .collect()
}

/// Students whose name contains `query`, each with the stop they board at
pub fn find_students<'a>(snapshot: &'a Snapshot, query: &str) -> Vec<StudentMatch<'a>> {
    let query = fold_width(query);
    if query.is_empty() {
        return vec![];
    }

    snapshot
        .students
        .iter()
        .filter(|s| fold_width(&s.name).contains(&query))
        .map(|student| StudentMatch {
            student,
            stop: snapshot.stops.iter().find(|stop| assigned_to(student, stop)),
        })
        .collect()
}
