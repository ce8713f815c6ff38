use geo::{GeodesicDistance, HaversineDestination, Point, Rect};

use crate::entities::{BusStop, Coordinate, NearestStop};

pub const NEAREST_LIMIT: usize = 3;

const MIN_VIEWPORT_RADIUS_METRES: f64 = 200.0;
const VIEWPORT_PADDING: f64 = 1.2;

/// The closest stops to `point`, nearest first, at most [`NEAREST_LIMIT`].
///
/// This is a full scan over every stop with a usable coordinate; stop tables
/// are a few hundred rows at most. Equal distances keep table order.
pub fn rank_nearest(point: Coordinate, stops: &[BusStop]) -> Vec<NearestStop<'_>> {
    let origin: Point = point.into();

    let mut ranked = stops
        .iter()
        .filter_map(|stop| {
            let position: Point = stop.coordinate()?.into();
            Some(NearestStop {
                stop,
                distance_meters: origin.geodesic_distance(&position),
            })
        })
        .collect::<Vec<_>>();

    // sort_by is stable
    ranked.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    ranked.truncate(NEAREST_LIMIT);
    ranked
}

pub fn get_bounding_box(center: Point, min_radius_metres: f64) -> Rect {
    // pythagoras
    let r_2 = min_radius_metres.powi(2);
    let corner_distance = (r_2 * 2.0).sqrt();

    Rect::new(
        // top left
        center.haversine_destination(315., corner_distance),
        // bottom right
        center.haversine_destination(135., corner_distance),
    )
}

/// Area a map should frame to show the search point and all its results
pub fn viewport(center: Coordinate, results: &[NearestStop]) -> Rect {
    let radius = results
        .iter()
        .map(|r| r.distance_meters)
        .fold(MIN_VIEWPORT_RADIUS_METRES, f64::max);

    get_bounding_box(center.into(), radius * VIEWPORT_PADDING)
}

#[cfg(test)]
mod test {

    use crate::test_utils::stop;

    use super::*;

    #[test]
    fn test_rank_nearest_two_stops() {
        let stops = vec![
            stop("1便", "A", Some(35.0), Some(139.0)),
            stop("1便", "B", Some(35.01), Some(139.0)),
        ];
        let point = Coordinate::new(35.0, 139.0).unwrap();

        let ranked = rank_nearest(point, &stops);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].stop.stop_name, "A");
        assert!(ranked[0].distance_meters.abs() < 1e-6);
        assert_eq!(ranked[1].stop.stop_name, "B");
        // 0.01 degrees of latitude is a little over a kilometre here
        assert!((ranked[1].distance_meters - 1109.0).abs() < 5.0);
    }

    #[test]
    fn test_rank_nearest_limits_and_skips_invalid() {
        let stops = vec![
            stop("1便", "no lat", None, Some(139.0)),
            stop("1便", "far", Some(35.1), Some(139.0)),
            stop("1便", "near", Some(35.001), Some(139.0)),
            stop("2便", "nowhere", None, None),
            stop("2便", "mid", Some(35.01), Some(139.0)),
            stop("2便", "farther", Some(35.2), Some(139.0)),
        ];
        let point = Coordinate::new(35.0, 139.0).unwrap();

        let ranked = rank_nearest(point, &stops);
        let names = ranked.iter().map(|r| r.stop.stop_name.as_str()).collect::<Vec<_>>();

        assert_eq!(names, vec!["near", "mid", "far"]);
        assert!(ranked.iter().all(|r| r.stop.coordinate().is_some()));
    }

    #[test]
    fn test_rank_nearest_ties_keep_table_order() {
        let stops = vec![
            stop("2便", "second route", Some(35.0), Some(139.0)),
            stop("1便", "first route", Some(35.0), Some(139.0)),
        ];
        let point = Coordinate::new(35.0, 139.0).unwrap();

        let ranked = rank_nearest(point, &stops);

        assert_eq!(ranked[0].stop.route, "2便");
        assert_eq!(ranked[1].stop.route, "1便");
    }

    #[test]
    fn test_rank_nearest_without_coordinates_is_empty() {
        let stops = vec![stop("1便", "A", None, None)];
        let point = Coordinate::new(35.0, 139.0).unwrap();

        assert!(rank_nearest(point, &stops).is_empty());
        assert!(rank_nearest(point, &[]).is_empty());
    }

    #[test]
    fn test_get_bounding_box() {
        let center = Point::new(139.0, 35.0);
        let min_radius_metres = 2000.0;

        let bounding_box = get_bounding_box(center, min_radius_metres);

        assert!(bounding_box.min().x < 139.0 && bounding_box.max().x > 139.0);
        assert!(bounding_box.min().y < 35.0 && bounding_box.max().y > 35.0);
    }

    #[test]
    fn test_viewport_contains_results() {
        let stops = vec![stop("1便", "B", Some(35.01), Some(139.0))];
        let center = Coordinate::new(35.0, 139.0).unwrap();
        let ranked = rank_nearest(center, &stops);

        let rect = viewport(center, &ranked);

        assert!(rect.max().y > 35.01);
        assert!(rect.min().y < 35.0);
    }
}
