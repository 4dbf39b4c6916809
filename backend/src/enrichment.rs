//! Attaches place names to extracted route steps.
//!
//! Two passes, run in order: [`enrich_localities`] names the settlement at
//! each step's start point, then [`annotate_intermediate_localities`] lists
//! the settlements a long step passes through. The second pass filters
//! against the first pass's names, so it must run after it completes.
//!
//! Individual lookup failures never abort a pass; the affected field is
//! simply left unset.

use futures::future::join_all;

use crate::geocoder::{Geocoder, PlaceKind};
use crate::geometry::{round6, sample_along};
use crate::models::{Coordinate, RouteGeometry, RouteStep, ViaLocality};

#[derive(Debug, Clone, Copy)]
pub struct AnnotationConfig {
    /// Steps at most this long are not sampled.
    pub min_step_m: i64,
    pub sample_interval_m: f64,
    pub max_samples: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            min_step_m: 5_000,
            sample_interval_m: 5_000.0,
            max_samples: 10,
        }
    }
}

/// Settlement name at `at`, or `Err(())` when the lookup itself failed.
async fn locality_at(geocoder: &dyn Geocoder, at: Coordinate) -> Result<Option<String>, ()> {
    match geocoder.reverse(at, Some(PlaceKind::Locality)).await {
        Ok(result) => Ok(result.locality_name().map(str::to_owned)),
        Err(err) => {
            tracing::debug!("reverse geocode at ({}, {}) failed: {err}", at.lat, at.lon);
            Err(())
        }
    }
}

/// Resolve every step's start-point locality with one concurrent batch.
pub async fn enrich_localities(geocoder: &dyn Geocoder, steps: &mut [RouteStep]) {
    tracing::debug!("enriching {} steps with localities", steps.len());

    let lookups = steps.iter().map(|step| {
        let at = step.start();
        async move {
            if at.is_null_island() {
                return Ok(None);
            }
            locality_at(geocoder, at).await
        }
    });
    let results = join_all(lookups).await;

    for (step, result) in steps.iter_mut().zip(results) {
        if let Ok(name) = result {
            step.locality = name;
        }
    }
}

fn push_unless_repeat(vias: &mut Vec<ViaLocality>, via: ViaLocality) {
    if vias.last().map_or(true, |last| last.name != via.name) {
        vias.push(via);
    }
}

/// Record the settlements each long step passes through.
///
/// Points are sampled along every step longer than `config.min_step_m`
/// and all of them are looked up in a single concurrent wave. Per step,
/// a name equal to the one just before it is dropped, then names equal
/// to the step's own locality are removed. Steps left with nothing get
/// `via_localities = None`.
pub async fn annotate_intermediate_localities(
    geocoder: &dyn Geocoder,
    steps: &mut [RouteStep],
    geometry: &RouteGeometry,
    config: &AnnotationConfig,
) {
    let samples: Vec<(usize, Coordinate)> = steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.distance_m > config.min_step_m)
        .flat_map(|(idx, _)| {
            sample_along(
                geometry.step_vertices(idx),
                config.sample_interval_m,
                config.max_samples,
            )
            .map(move |at| (idx, at))
        })
        .collect();

    if samples.is_empty() {
        tracing::debug!("no long steps to annotate");
        return;
    }
    tracing::debug!("looking up {} sample points along long steps", samples.len());

    let results = join_all(samples.iter().map(|&(_, at)| locality_at(geocoder, at))).await;

    let mut by_step: Vec<Vec<ViaLocality>> = vec![Vec::new(); steps.len()];
    for ((idx, at), result) in samples.into_iter().zip(results) {
        if let Ok(Some(name)) = result {
            push_unless_repeat(
                &mut by_step[idx],
                ViaLocality {
                    name,
                    lat: round6(at.lat),
                    lon: round6(at.lon),
                },
            );
        }
    }

    for (step, mut vias) in steps.iter_mut().zip(by_step) {
        if let Some(own) = step.locality.as_deref() {
            vias.retain(|via| via.name != own);
        }
        step.via_localities = (!vias.is_empty()).then_some(vias);
    }
}
