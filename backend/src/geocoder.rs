use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::Mutex,
};

use async_trait::async_trait;
use lru::LruCache;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::RouteError;
use crate::http_clients::upstream_error_message;
use crate::models::Coordinate;

const PROVIDER: &str = "Geocoder";

/// Address component granularity understood by the reverse geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceKind {
    House,
    Street,
    Locality,
    Province,
}

impl PlaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaceKind::House => "house",
            PlaceKind::Street => "street",
            PlaceKind::Locality => "locality",
            PlaceKind::Province => "province",
        }
    }
}

/// Provider-independent reverse-geocoding answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeResult {
    pub name: Option<String>,
    pub full: Option<String>,
    /// Component kind (`locality`, `province`, ...) to component name.
    pub components: HashMap<String, String>,
}

impl GeocodeResult {
    pub fn component(&self, kind: PlaceKind) -> Option<&str> {
        self.components
            .get(kind.as_str())
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Settlement name, falling back to the region when there is none.
    pub fn locality_name(&self) -> Option<&str> {
        self.component(PlaceKind::Locality)
            .or_else(|| self.component(PlaceKind::Province))
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.full.is_none() && self.components.is_empty()
    }
}

/// Forward and reverse geocoding.
///
/// Implementations report transport and status failures as errors; a
/// reverse lookup that simply finds nothing returns an empty result.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Address text to coordinates.
    async fn forward(&self, address: &str) -> Result<Coordinate, RouteError>;

    /// Coordinates to address components, optionally restricted to one kind.
    async fn reverse(&self, at: Coordinate, kind: Option<PlaceKind>) -> Result<GeocodeResult, RouteError>;
}

pub struct YandexGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    reverse_gate: Semaphore,
}

impl YandexGeocoder {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>, reverse_concurrency: usize) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            reverse_gate: Semaphore::new(reverse_concurrency.max(1)),
        }
    }

    fn base_query(&self, geocode: String) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.api_key.clone()),
            ("geocode", geocode),
            ("lang", "ru_RU".to_string()),
            ("results", "1".to_string()),
            ("format", "json".to_string()),
        ]
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn forward(&self, address: &str) -> Result<Coordinate, RouteError> {
        tracing::debug!("forward geocode: {address}");
        let response = self
            .client
            .get(&self.url)
            .query(&self.base_query(address.to_string()))
            .send()
            .await
            .map_err(RouteError::transport(PROVIDER))?;

        let status = response.status();
        let body = response.text().await.map_err(RouteError::transport(PROVIDER))?;
        if !status.is_success() {
            let message = upstream_error_message(&body);
            tracing::info!("forward geocode HTTP {}: {}", status.as_u16(), message);
            return Err(RouteError::UpstreamStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        let unresolvable = |details: String| RouteError::UnresolvableAddress {
            address: address.to_string(),
            details,
        };
        let json: Value = serde_json::from_str(&body).map_err(|e| unresolvable(e.to_string()))?;
        parse_forward(&json).map_err(|details| {
            tracing::info!("forward geocode could not resolve {address:?}: {details}");
            unresolvable(details)
        })
    }

    async fn reverse(&self, at: Coordinate, kind: Option<PlaceKind>) -> Result<GeocodeResult, RouteError> {
        let mut query = self.base_query(format!("{},{}", at.lat, at.lon));
        query.push(("sco", "latlong".to_string()));
        if let Some(kind) = kind {
            query.push(("kind", kind.as_str().to_string()));
        }

        let (status, body) = {
            // The gate is never closed, so a failed acquire cannot happen.
            let _permit = self.reverse_gate.acquire().await.ok();
            let response = self
                .client
                .get(&self.url)
                .query(&query)
                .send()
                .await
                .map_err(RouteError::transport(PROVIDER))?;
            let status = response.status();
            (status, response.text().await.map_err(RouteError::transport(PROVIDER))?)
        };

        if !status.is_success() {
            tracing::info!("reverse geocode HTTP {}", status.as_u16());
            return Ok(GeocodeResult::default());
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => Ok(parse_reverse(&json)),
            Err(e) => {
                tracing::debug!("reverse geocode returned non-JSON body: {e}");
                Ok(GeocodeResult::default())
            }
        }
    }
}

/// Reverse lookups memoized by position and kind.
///
/// Only non-empty answers are kept, so a transient provider failure is
/// retried by the next request instead of being remembered.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Mutex<LruCache<(i64, i64, Option<PlaceKind>), GeocodeResult>>,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(at: Coordinate, kind: Option<PlaceKind>) -> (i64, i64, Option<PlaceKind>) {
        (
            (at.lat * 1e6).round() as i64,
            (at.lon * 1e6).round() as i64,
            kind,
        )
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    async fn forward(&self, address: &str) -> Result<Coordinate, RouteError> {
        self.inner.forward(address).await
    }

    async fn reverse(&self, at: Coordinate, kind: Option<PlaceKind>) -> Result<GeocodeResult, RouteError> {
        let key = Self::key(at, kind);
        if let Some(hit) = self.cache.lock().ok().and_then(|mut cache| cache.get(&key).cloned()) {
            tracing::trace!("reverse geocode cache hit for {at:?}");
            return Ok(hit);
        }

        let result = self.inner.reverse(at, kind).await?;
        if !result.is_empty() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, result.clone());
            }
        }
        Ok(result)
    }
}

// Legacy nested response: response.GeoObjectCollection.featureMember[].GeoObject

#[derive(Deserialize)]
struct LegacyEnvelope {
    response: LegacyResponse,
}

#[derive(Deserialize)]
struct LegacyResponse {
    #[serde(rename = "GeoObjectCollection")]
    collection: LegacyCollection,
}

#[derive(Deserialize)]
struct LegacyCollection {
    #[serde(rename = "featureMember")]
    members: Vec<LegacyMember>,
}

#[derive(Deserialize)]
struct LegacyMember {
    #[serde(rename = "GeoObject")]
    geo_object: LegacyGeoObject,
}

#[derive(Deserialize)]
struct LegacyGeoObject {
    name: Option<String>,
    #[serde(rename = "Point")]
    point: Option<LegacyPoint>,
    #[serde(rename = "metaDataProperty")]
    meta: Option<LegacyMeta>,
}

#[derive(Deserialize)]
struct LegacyPoint {
    /// `"lon lat"`
    pos: String,
}

#[derive(Deserialize)]
struct LegacyMeta {
    #[serde(rename = "GeocoderMetaData")]
    geocoder: LegacyGeocoderMeta,
}

#[derive(Deserialize)]
struct LegacyGeocoderMeta {
    #[serde(rename = "Address")]
    address: AddressBlock,
}

#[derive(Deserialize, Default)]
struct AddressBlock {
    formatted: Option<String>,
    #[serde(rename = "Components", default)]
    components: Vec<Component>,
}

#[derive(Deserialize)]
struct Component {
    kind: Option<String>,
    name: Option<String>,
}

// GeoJSON-like response: features[].{geometry, properties}

#[derive(Deserialize)]
struct GeoJsonEnvelope {
    features: Vec<GeoJsonFeature>,
}

#[derive(Deserialize)]
struct GeoJsonFeature {
    geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    properties: GeoJsonProperties,
}

#[derive(Deserialize)]
struct GeoJsonGeometry {
    coordinates: Vec<f64>,
}

#[derive(Deserialize, Default)]
struct GeoJsonProperties {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "Components", default)]
    components: Vec<Component>,
    #[serde(rename = "Address")]
    address: Option<AddressBlock>,
}

fn components_map(components: Vec<Component>) -> HashMap<String, String> {
    components
        .into_iter()
        .filter_map(|c| match (c.kind, c.name) {
            (Some(kind), Some(name)) if !kind.is_empty() && !name.is_empty() => Some((kind, name)),
            _ => None,
        })
        .collect()
}

fn first_legacy_object(json: &Value) -> Option<LegacyGeoObject> {
    let envelope: LegacyEnvelope = serde_json::from_value(json.clone()).ok()?;
    envelope.response.collection.members.into_iter().next().map(|m| m.geo_object)
}

fn first_geojson_feature(json: &Value) -> Option<GeoJsonFeature> {
    let envelope: GeoJsonEnvelope = serde_json::from_value(json.clone()).ok()?;
    envelope.features.into_iter().next()
}

/// Coordinates of the best forward match, or a description of why there is none.
pub fn parse_forward(json: &Value) -> Result<Coordinate, String> {
    let legacy = first_legacy_object(json)
        .and_then(|object| object.point)
        .and_then(|point| {
            let mut parts = point.pos.split_whitespace().map(str::parse::<f64>);
            match (parts.next(), parts.next()) {
                (Some(Ok(lon)), Some(Ok(lat))) => Some(Coordinate::new(lat, lon)),
                _ => None,
            }
        });
    if let Some(coord) = legacy {
        return Ok(coord);
    }

    let feature = first_geojson_feature(json).ok_or_else(|| "no matching features".to_string())?;
    match feature.geometry.as_ref().map(|g| g.coordinates.as_slice()) {
        Some([lon, lat, ..]) => Ok(Coordinate::new(*lat, *lon)),
        _ => Err("feature has no point geometry".to_string()),
    }
}

/// Normalized reverse answer; empty when neither known shape matches.
pub fn parse_reverse(json: &Value) -> GeocodeResult {
    if let Some(object) = first_legacy_object(json) {
        if let Some(meta) = object.meta {
            let address = meta.geocoder.address;
            return GeocodeResult {
                name: object.name,
                full: address.formatted,
                components: components_map(address.components),
            };
        }
    }

    match first_geojson_feature(json) {
        Some(feature) => {
            let props = feature.properties;
            let components = if props.components.is_empty() {
                props.address.map(|a| a.components).unwrap_or_default()
            } else {
                props.components
            };
            GeocodeResult {
                name: props.name,
                full: props.description,
                components: components_map(components),
            }
        }
        None => {
            tracing::debug!("reverse geocode: no components found");
            GeocodeResult::default()
        }
    }
}
