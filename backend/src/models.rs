use std::ops::Range;

use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

pub use shared::{
    ApiError, ChatRequest, ChatResponse, Coordinate, ErrorKind, HealthResponse, PointInput,
    ResponseType, RouteOptions, RouteRequest, RouteResponse, RouteStep, ViaLocality,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A route endpoint after geocoding, with the label shown in the narrative.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPoint {
    pub coord: Coordinate,
    pub label: String,
}

/// Whole-route polyline plus each step's slice of it.
#[derive(Debug, Clone)]
pub struct RouteGeometry {
    /// Vertices as `x` = lon, `y` = lat.
    pub line: LineString<f64>,
    /// Half-open vertex range per step, parallel to the step list.
    pub step_ranges: Vec<Range<usize>>,
}

impl RouteGeometry {
    /// Vertices belonging to step `idx`, empty when the step is unknown.
    pub fn step_vertices(&self, idx: usize) -> &[Coord<f64>] {
        self.step_ranges
            .get(idx)
            .and_then(|range| self.line.0.get(range.clone()))
            .unwrap_or(&[])
    }
}

/// Output of step extraction: the steps, route totals, and shared geometry.
#[derive(Debug, Clone)]
pub struct ExtractedRoute {
    pub steps: Vec<RouteStep>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub geometry: RouteGeometry,
}
