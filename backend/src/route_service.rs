use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::directions::{extract_steps, DirectionsProvider};
use crate::enrichment::{annotate_intermediate_localities, enrich_localities, AnnotationConfig};
use crate::error::RouteError;
use crate::geocoder::Geocoder;
use crate::gpx_export::encode_route_as_gpx;
use crate::models::{ErrorKind, PointInput, ResolvedPoint, RouteRequest, RouteResponse};
use crate::narrative::{build_markdown, Labels};

/// Route request pipeline: resolve endpoints, fetch directions, extract
/// steps, enrich them with place names, render the narrative.
pub struct RouteService {
    geocoder: Arc<dyn Geocoder>,
    directions: Arc<dyn DirectionsProvider>,
    annotation: AnnotationConfig,
    labels: Labels,
}

impl RouteService {
    pub fn new(geocoder: Arc<dyn Geocoder>, directions: Arc<dyn DirectionsProvider>) -> Self {
        Self {
            geocoder,
            directions,
            annotation: AnnotationConfig::default(),
            labels: Labels::default(),
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationConfig) -> Self {
        self.annotation = annotation;
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub async fn resolve_point(&self, point: &PointInput) -> Result<ResolvedPoint, RouteError> {
        match point {
            PointInput::Coordinates(coord) => Ok(ResolvedPoint {
                coord: *coord,
                label: format!("{:.6}, {:.6}", coord.lat, coord.lon),
            }),
            PointInput::Address(address) => Ok(ResolvedPoint {
                coord: self.geocoder.forward(address).await?,
                label: address.clone(),
            }),
        }
    }

    /// Run the pipeline. A route without steps is a normal, non-`ok`
    /// response rather than an error.
    pub async fn plan(&self, req: &RouteRequest) -> Result<RouteResponse, RouteError> {
        let (a, b) = tokio::try_join!(self.resolve_point(&req.a), self.resolve_point(&req.b))?;
        tracing::debug!(
            "resolved coords: A=({}, {}) B=({}, {})",
            a.coord.lat,
            a.coord.lon,
            b.coord.lat,
            b.coord.lon
        );

        let answer = self.directions.directions(a.coord, b.coord, &req.options).await?;
        let mut route = extract_steps(answer)?;
        if route.steps.is_empty() {
            tracing::info!("route is empty");
            return Ok(RouteResponse::failure(ErrorKind::EmptyRoute, self.labels.empty_route));
        }

        enrich_localities(self.geocoder.as_ref(), &mut route.steps).await;
        annotate_intermediate_localities(
            self.geocoder.as_ref(),
            &mut route.steps,
            &route.geometry,
            &self.annotation,
        )
        .await;

        let markdown = build_markdown(
            &a,
            &b,
            &route.steps,
            route.total_distance_m,
            route.total_duration_s,
            &self.labels,
        );
        let gpx_base64 = if req.options.include_gpx {
            Some(encode_route_as_gpx(&route.geometry, &a, &b)?)
        } else {
            None
        };

        tracing::info!("route success: steps={}", route.steps.len());
        Ok(RouteResponse::success(markdown, route.steps, gpx_base64))
    }

    /// [`plan`](Self::plan) with every failure, panics included, folded
    /// into a structured response. The pipeline runs on the caller's
    /// task, so dropping this future stops all outstanding lookups.
    pub async fn respond(&self, req: RouteRequest) -> RouteResponse {
        match AssertUnwindSafe(self.plan(&req)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::info!("route failed: {err}");
                RouteResponse::failure(err.kind(), err.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!("route pipeline panicked: {reason}");
                RouteResponse::failure(ErrorKind::Unexpected, format!("unexpected error: {reason}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("pipeline panicked")
}
