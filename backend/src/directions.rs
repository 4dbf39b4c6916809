use async_trait::async_trait;
use geo_types::{Coord, LineString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RouteError;
use crate::geometry::round6;
use crate::http_clients::upstream_error_message;
use crate::models::{Coordinate, ExtractedRoute, RouteGeometry, RouteOptions, RouteStep};

const PROVIDER: &str = "ORS";

/// Source of driving directions between two points.
///
/// Path and ETA computation live entirely with the provider; callers
/// only turn the answer into steps with [`extract_steps`].
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn directions(
        &self,
        from: Coordinate,
        to: Coordinate,
        options: &RouteOptions,
    ) -> Result<DirectionsResponse, RouteError>;
}

/// openrouteservice `directions/{profile}/geojson` client.
pub struct OrsDirections {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl OrsDirections {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct OrsRequest<'a> {
    /// `[lon, lat]` pairs
    coordinates: [[f64; 2]; 2],
    language: &'a str,
    units: &'static str,
    instructions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OrsRequestOptions>,
}

#[derive(Serialize)]
struct OrsRequestOptions {
    avoid_features: Vec<&'static str>,
}

#[async_trait]
impl DirectionsProvider for OrsDirections {
    async fn directions(
        &self,
        from: Coordinate,
        to: Coordinate,
        options: &RouteOptions,
    ) -> Result<DirectionsResponse, RouteError> {
        let body = OrsRequest {
            coordinates: [[from.lon, from.lat], [to.lon, to.lat]],
            language: &options.language,
            units: "m",
            instructions: true,
            options: options.avoid_tolls.then(|| OrsRequestOptions {
                avoid_features: vec!["tollways"],
            }),
        };

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RouteError::transport(PROVIDER))?;

        let status = response.status();
        let text = response.text().await.map_err(RouteError::transport(PROVIDER))?;
        if !status.is_success() {
            return Err(RouteError::UpstreamStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                message: upstream_error_message(&text),
            });
        }
        serde_json::from_str(&text).map_err(|e| RouteError::MalformedRoute(e.to_string()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<DirectionsFeature>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectionsFeature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub geometry: FeatureGeometry,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: FeatureProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeatureGeometry {
    /// `[lon, lat]` or `[lon, lat, elevation]`
    #[serde(default, deserialize_with = "null_as_default")]
    pub coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeatureProperties {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: RouteSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<RouteSegment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteSummary {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteSegment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<ProviderStep>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderStep {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    pub instruction: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub way_points: Vec<usize>,
}

/// Turn a provider answer into ordered steps plus the shared route geometry.
///
/// A response without any feature is [`RouteError::RouteNotFound`]; a
/// feature whose segments carry no steps is a valid, empty route.
pub fn extract_steps(response: DirectionsResponse) -> Result<ExtractedRoute, RouteError> {
    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or(RouteError::RouteNotFound)?;

    let vertices = feature
        .geometry
        .coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            [lon, lat, ..] => Ok(Coord { x: *lon, y: *lat }),
            _ => Err(RouteError::MalformedRoute(format!("vertex {pair:?} is not [lon, lat]"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut steps = Vec::new();
    let mut step_ranges = Vec::new();
    for provider_step in feature.properties.segments.into_iter().flat_map(|s| s.steps) {
        let first = provider_step.way_points.first().copied().unwrap_or(0);
        let last = provider_step.way_points.get(1).copied().unwrap_or(first).max(first);
        let start = vertices.get(first).ok_or_else(|| {
            RouteError::MalformedRoute(format!(
                "way point {first} outside geometry of {} vertices",
                vertices.len()
            ))
        })?;

        steps.push(RouteStep {
            idx: steps.len(),
            start_lat: round6(start.y),
            start_lon: round6(start.x),
            distance_m: provider_step.distance.round() as i64,
            duration_s: provider_step.duration.round() as i64,
            instruction: provider_step.instruction,
            street: provider_step.name.filter(|name| !name.is_empty()),
            locality: None,
            via_localities: None,
        });
        step_ranges.push(first..(last + 1).min(vertices.len()));
    }

    tracing::debug!(
        "extracted steps={} total_m={} total_s={}",
        steps.len(),
        feature.properties.summary.distance,
        feature.properties.summary.duration
    );

    Ok(ExtractedRoute {
        steps,
        total_distance_m: feature.properties.summary.distance,
        total_duration_s: feature.properties.summary.duration,
        geometry: RouteGeometry {
            line: LineString::new(vertices),
            step_ranges,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> DirectionsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_features_is_route_not_found() {
        let err = extract_steps(parse(json!({"features": []}))).unwrap_err();
        assert!(matches!(err, RouteError::RouteNotFound));
        let err = extract_steps(parse(json!({"features": null}))).unwrap_err();
        assert!(matches!(err, RouteError::RouteNotFound));
    }

    #[test]
    fn feature_without_steps_is_empty_route() {
        let route = extract_steps(parse(json!({"features": [{
            "geometry": {"coordinates": [[37.6, 55.7], [37.7, 55.8]]},
            "properties": {"summary": {"distance": 10.0, "duration": 2.0}, "segments": [{"steps": []}]}
        }]})))
        .unwrap();
        assert!(route.steps.is_empty());
        assert_eq!(route.total_distance_m, 10.0);
    }

    #[test]
    fn steps_are_rounded_and_bounded() {
        let route = extract_steps(parse(json!({"features": [{
            "geometry": {"coordinates": [
                [37.617_634_9, 55.755_814_1], [37.62, 55.76], [37.7, 55.8, 150.0], [37.8, 55.9]
            ]},
            "properties": {
                "summary": {"distance": 12_345.6, "duration": 900.4},
                "segments": [
                    {"steps": [
                        {"distance": 1_200.6, "duration": 95.4, "instruction": "Head north", "name": "Тверская", "way_points": [0, 2]},
                        {"distance": 0.4, "duration": 0.0, "instruction": "Arrive", "name": "-", "way_points": [2, 2]}
                    ]},
                    {"steps": [
                        {"distance": 8_000.0, "duration": 600.0, "instruction": "Continue", "name": "", "way_points": [2, 3]}
                    ]}
                ]
            }
        }]})))
        .unwrap();

        assert_eq!(route.steps.len(), 3);
        let first = &route.steps[0];
        assert_eq!(first.idx, 0);
        assert_eq!((first.start_lat, first.start_lon), (55.755_814, 37.617_635));
        assert_eq!((first.distance_m, first.duration_s), (1_201, 95));
        assert_eq!(first.street.as_deref(), Some("Тверская"));
        assert_eq!(route.steps[2].idx, 2);
        assert_eq!(route.steps[2].street, None);

        assert_eq!(route.geometry.step_ranges, vec![0..3, 2..3, 2..4]);
        assert_eq!(route.geometry.step_vertices(2).len(), 2);
    }

    #[test]
    fn way_point_outside_geometry_is_malformed() {
        let err = extract_steps(parse(json!({"features": [{
            "geometry": {"coordinates": [[37.6, 55.7]]},
            "properties": {"segments": [{"steps": [{"way_points": [4, 5]}]}]}
        }]})))
        .unwrap_err();
        assert!(matches!(err, RouteError::MalformedRoute(_)));
    }

    #[test]
    fn request_body_uses_lon_lat_and_toll_avoidance() {
        let options = RouteOptions {
            avoid_tolls: true,
            ..Default::default()
        };
        let body = OrsRequest {
            coordinates: [[37.6, 55.7], [35.9, 56.8]],
            language: &options.language,
            units: "m",
            instructions: true,
            options: options.avoid_tolls.then(|| OrsRequestOptions {
                avoid_features: vec!["tollways"],
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["coordinates"][0], json!([37.6, 55.7]));
        assert_eq!(value["options"]["avoid_features"], json!(["tollways"]));
        assert_eq!(value["language"], "ru");
    }
}
