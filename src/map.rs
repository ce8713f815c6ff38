use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use itertools::Itertools;
use serde_json::json;

use crate::entities::{RouteName, RouteSelection, Snapshot};

const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];
const UNMATCHED_COLOR: &str = "#9e9e9e";

const SELECTED_WEIGHT: u32 = 6;
const UNSELECTED_WEIGHT: u32 = 3;
const UNMATCHED_WEIGHT: u32 = 2;
const SELECTED_OPACITY: f64 = 0.9;
const UNSELECTED_OPACITY: f64 = 0.3;

#[derive(thiserror::Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Expected a FeatureCollection")]
    NotACollection,
}

pub type MapResult<T> = Result<T, MapError>;

/// Named route lines from a GeoJSON file
#[derive(Debug, Clone, Default)]
pub struct RouteLines {
    features: Vec<Feature>,
}

fn feature_name(feature: &Feature) -> Option<&str> {
    feature.property("name").and_then(JsonValue::as_str)
}

fn is_line(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(geojson::Value::LineString(_)) | Some(geojson::Value::MultiLineString(_))
    )
}

impl RouteLines {
    pub fn load(path: &Path) -> MapResult<RouteLines> {
        let text = std::fs::read_to_string(path)?;
        let lines = RouteLines::parse(&text)?;
        log::info!("Loaded {} route lines from {}", lines.len(), path.display());
        Ok(lines)
    }

    pub fn parse(text: &str) -> MapResult<RouteLines> {
        match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => Ok(RouteLines::from_collection(collection)),
            _ => Err(MapError::NotACollection),
        }
    }

    /// Keeps the LineString and MultiLineString features that have a name
    pub fn from_collection(collection: FeatureCollection) -> RouteLines {
        let features = collection
            .features
            .into_iter()
            .filter(|f| is_line(f) && feature_name(f).is_some())
            .collect();
        RouteLines { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

/// Colour per base route name, by first appearance in the stop table
fn route_colors(snapshot: &Snapshot) -> Vec<(RouteName, &'static str)> {
    snapshot
        .stops
        .iter()
        .map(|s| RouteName::parse(&s.route).base)
        .unique()
        .enumerate()
        .map(|(i, base)| {
            (
                RouteName {
                    base,
                    variant: None,
                },
                PALETTE[i % PALETTE.len()],
            )
        })
        .collect()
}

fn color_for(colors: &[(RouteName, &'static str)], route: &RouteName) -> Option<&'static str> {
    colors
        .iter()
        .find(|(name, _)| name.matches(route))
        .map(|(_, color)| *color)
}

fn properties(value: JsonValue) -> Option<JsonObject> {
    match value {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

fn styled_line(feature: &Feature, colors: &[(RouteName, &'static str)], selection: &RouteSelection) -> Feature {
    let name = feature_name(feature).unwrap_or_default();
    let route = RouteName::parse(name);

    let (color, weight, opacity) = match color_for(colors, &route) {
        Some(color) if selection.includes(name) => (color, SELECTED_WEIGHT, SELECTED_OPACITY),
        Some(color) => (color, UNSELECTED_WEIGHT, UNSELECTED_OPACITY),
        None => (UNMATCHED_COLOR, UNMATCHED_WEIGHT, UNSELECTED_OPACITY),
    };

    let mut styled = feature.clone();
    styled.set_property("color", color);
    styled.set_property("weight", weight);
    styled.set_property("opacity", opacity);
    styled
}

/// Stops of the selected route(s) as points, plus every route line styled
/// by whether it belongs to the selection
pub fn build_map(snapshot: &Snapshot, lines: Option<&RouteLines>, selection: &RouteSelection) -> FeatureCollection {
    let colors = route_colors(snapshot);

    let stops = snapshot
        .stops
        .iter()
        .filter(|stop| selection.includes(&stop.route))
        .filter_map(|stop| {
            let coordinate = stop.coordinate()?;
            let color = color_for(&colors, &RouteName::parse(&stop.route)).unwrap_or(UNMATCHED_COLOR);
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Point(vec![
                    coordinate.lng,
                    coordinate.lat,
                ]))),
                id: None,
                properties: properties(json!({
                    "route": stop.route,
                    "stop_name": stop.stop_name,
                    "sequence": stop.sequence,
                    "time_to": stop.time_to,
                    "time_from": stop.time_from,
                    "color": color,
                })),
                foreign_members: None,
            })
        });

    let lines = lines
        .into_iter()
        .flat_map(|l| l.features.iter())
        .map(|f| styled_line(f, &colors, selection));

    FeatureCollection {
        bbox: None,
        features: lines.chain(stops).collect(),
        foreign_members: None,
    }
}
