use serde::{Deserialize, Serialize};

/// A single marker on the map.
///
/// Equality is an exact match on both coordinates. There is no tolerance, so
/// a coordinate that comes back from storage with a different last digit will
/// not be considered the same point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Point { lat, lng }
    }

    pub fn matches(&self, lat: f64, lng: f64) -> bool {
        self.lat == lat && self.lng == lng
    }
}

impl From<Point> for geo_types::Coord<f64> {
    fn from(point: Point) -> Self {
        // geo uses x = longitude, y = latitude
        geo_types::coord! { x: point.lng, y: point.lat }
    }
}

/// Ordered markers of one user, insertion order defines the route.
pub type PointSequence = Vec<Point>;

pub fn position_of(sequence: &[Point], lat: f64, lng: f64) -> Option<usize> {
    sequence.iter().position(|p| p.matches(lat, lng))
}

/// Appends every incoming point that is not already present in `sequence`
/// (points appended earlier in the same call count as present). Returns the
/// number of points appended.
pub fn merge_without_duplicates<I>(sequence: &mut PointSequence, incoming: I) -> usize
where
    I: IntoIterator<Item = Point>,
{
    let mut added = 0;
    for point in incoming {
        if position_of(sequence, point.lat, point.lng).is_none() {
            sequence.push(point);
            added += 1;
        }
    }
    added
}
