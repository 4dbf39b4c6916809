use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// `(0, 0)` is what providers hand back when a position is missing.
    pub fn is_null_island(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// One end of a route: free-text address or explicit coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub enum PointInput {
    Address(String),
    Coordinates(Coordinate),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lon: Option<f64>,
}

impl TryFrom<RawPoint> for PointInput {
    type Error = String;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        match (raw.lat, raw.lon, raw.address) {
            (Some(lat), Some(lon), _) => Ok(PointInput::Coordinates(Coordinate { lat, lon })),
            (_, _, Some(address)) if !address.trim().is_empty() => Ok(PointInput::Address(address)),
            _ => Err("Provide either 'address' or both 'lat' and 'lon'".to_string()),
        }
    }
}

impl From<PointInput> for RawPoint {
    fn from(point: PointInput) -> Self {
        match point {
            PointInput::Address(address) => RawPoint {
                address: Some(address),
                ..Default::default()
            },
            PointInput::Coordinates(coord) => RawPoint {
                lat: Some(coord.lat),
                lon: Some(coord.lon),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(default)]
    pub avoid_tolls: bool,
    /// Instruction language requested from the directions provider.
    #[serde(default = "default_language")]
    pub language: String,
    /// Attach the route geometry as a base64 GPX document.
    #[serde(default)]
    pub include_gpx: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            avoid_tolls: false,
            language: default_language(),
            include_gpx: false,
        }
    }
}

pub fn default_language() -> String {
    "ru".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub a: PointInput,
    pub b: PointInput,
    #[serde(default)]
    pub options: RouteOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaLocality {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub idx: usize,
    pub start_lat: f64,
    pub start_lon: f64,
    pub distance_m: i64,
    pub duration_s: i64,
    pub instruction: Option<String>,
    pub street: Option<String>,
    pub locality: Option<String>,
    /// `None` when the step passes through no other settlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_localities: Option<Vec<ViaLocality>>,
}

impl RouteStep {
    pub fn start(&self) -> Coordinate {
        Coordinate {
            lat: self.start_lat,
            lon: self.start_lon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Result,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamUnavailable,
    UnresolvableInput,
    EmptyRoute,
    Unexpected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<RouteStep>>,
    #[serde(rename = "type", default)]
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpx_base64: Option<String>,
}

impl RouteResponse {
    pub fn success(markdown: String, steps: Vec<RouteStep>, gpx_base64: Option<String>) -> Self {
        Self {
            ok: true,
            markdown: Some(markdown),
            steps: Some(steps),
            response_type: ResponseType::Result,
            error_kind: None,
            message: None,
            gpx_base64,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            markdown: None,
            steps: None,
            response_type: ResponseType::Error,
            error_kind: Some(kind),
            message: Some(message.into()),
            gpx_base64: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_text: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: Uuid,
    pub assistant_text: String,
    #[serde(default)]
    pub response_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
