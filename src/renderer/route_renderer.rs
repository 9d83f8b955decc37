use geo_types::LineString;
use itertools::Itertools;

use crate::point::Point;
use crate::utils;

pub const DEFAULT_LINE_COLOR: &str = "blue";
// 5px solid, 10px gap
pub const DASH_PATTERN: &str = "5, 10";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStyle {
    pub color: String,
    /// `None` means a solid line.
    pub dash_array: Option<String>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_LINE_COLOR.to_string(),
            dash_array: None,
        }
    }
}

impl LineStyle {
    pub fn is_dashed(&self) -> bool {
        self.dash_array.is_some()
    }
}

/// What the map surface needs to draw the route after a change.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    pub line: Vec<Point>,
    pub distance_km: f64,
    pub version: u64,
}

impl RouteView {
    /// Less than two points can't be drawn as a line.
    pub fn is_degenerate(&self) -> bool {
        self.line.len() < 2
    }

    pub fn distance_text(&self) -> String {
        utils::format_distance_km(self.distance_km)
    }
}

pub struct RouteRenderer {
    line: Vec<Point>,
    style: LineStyle,
    version: u64,
    current_distance: Option<f64>,
}

impl RouteRenderer {
    pub fn new() -> Self {
        Self {
            line: Vec::new(),
            style: LineStyle::default(),
            version: 0,
            current_distance: None,
        }
    }

    pub fn compute_line(sequence: &[Point]) -> Vec<Point> {
        sequence.to_vec()
    }

    /// Sum of great-circle distances between consecutive points, in km.
    pub fn compute_distance(sequence: &[Point]) -> f64 {
        sequence
            .iter()
            .tuple_windows()
            .map(|(a, b)| utils::haversine_distance_km(a, b))
            // `sum` of no floats is -0.0, which would print as "-0.00 km"
            .fold(0.0, |total, d| total + d)
    }

    pub fn render(&mut self, sequence: &[Point]) -> RouteView {
        self.line = Self::compute_line(sequence);
        self.reset();
        self.view()
    }

    /// Drops everything drawn so far, the style is kept.
    pub fn clear(&mut self) {
        self.line.clear();
        self.reset();
    }

    fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.current_distance = None;
    }

    pub fn view(&mut self) -> RouteView {
        RouteView {
            line: self.line.clone(),
            distance_km: self.get_current_distance(),
            version: self.version,
        }
    }

    pub fn line(&self) -> &[Point] {
        &self.line
    }

    pub fn get_current_version(&self) -> u64 {
        self.version
    }

    pub fn get_current_distance(&mut self) -> f64 {
        let line = &self.line;
        *self
            .current_distance
            .get_or_insert_with(|| Self::compute_distance(line))
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        self.line.iter().copied().collect()
    }

    pub fn style(&self) -> &LineStyle {
        &self.style
    }

    pub fn set_color(&mut self, color: &str) {
        debug!("[route_renderer] line color set to {}", color);
        self.style.color = color.to_string();
    }

    /// Flips between dashed and solid, returns whether the line is dashed now.
    pub fn toggle_dashed(&mut self) -> bool {
        self.style.dash_array = match self.style.dash_array {
            Some(_) => None,
            None => Some(DASH_PATTERN.to_string()),
        };
        self.style.is_dashed()
    }
}
