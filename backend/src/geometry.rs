use geo_types::Coord;

use crate::models::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two `(lat, lon)` positions.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let sin_dphi = (dphi / 2.0).sin();
    let sin_dlambda = (dlambda / 2.0).sin();

    let h = sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda;
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Distance between two polyline vertices (`x` = lon, `y` = lat).
fn vertex_distance_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine_m(a.y, a.x, b.y, b.x)
}

pub fn polyline_length_m(polyline: &[Coord<f64>]) -> f64 {
    polyline
        .windows(2)
        .map(|w| vertex_distance_m(w[0], w[1]))
        .sum()
}

/// Rounds to 6 decimal digits (~0.1 m), the precision every emitted coordinate uses.
pub fn round6(x: f64) -> f64 {
    format!("{x:.6}").parse().unwrap_or(x)
}

/// Points every `interval_m` meters along `polyline`, endpoints excluded.
///
/// Yields at most `max_points` positions. A polyline shorter than the
/// interval yields nothing. Each position is linearly interpolated inside
/// its bounding segment and rounded with [`round6`].
pub fn sample_along(polyline: &[Coord<f64>], interval_m: f64, max_points: usize) -> AlongSamples<'_> {
    let segments: Vec<f64> = polyline
        .windows(2)
        .map(|w| vertex_distance_m(w[0], w[1]))
        .collect();
    let total: f64 = segments.iter().sum();

    let mut remaining = 0;
    if interval_m > 0.0 && total >= interval_m {
        while remaining < max_points && (remaining + 1) as f64 * interval_m < total {
            remaining += 1;
        }
    }

    tracing::trace!(
        vertices = polyline.len(),
        total_m = total,
        interval_m,
        targets = remaining,
        "sampling polyline"
    );

    AlongSamples {
        vertices: polyline,
        segments,
        interval_m,
        remaining,
        k: 1,
        seg_idx: 0,
        acc: 0.0,
    }
}

/// Iterator returned by [`sample_along`]. The segment cursor only moves
/// forward, so the whole walk is linear in the number of vertices.
pub struct AlongSamples<'a> {
    vertices: &'a [Coord<f64>],
    segments: Vec<f64>,
    interval_m: f64,
    remaining: usize,
    k: usize,
    seg_idx: usize,
    acc: f64,
}

impl Iterator for AlongSamples<'_> {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let target = self.k as f64 * self.interval_m;

        while self.seg_idx < self.segments.len() && self.acc + self.segments[self.seg_idx] < target {
            self.acc += self.segments[self.seg_idx];
            self.seg_idx += 1;
        }
        if self.seg_idx >= self.segments.len() {
            self.remaining = 0;
            return None;
        }

        let seg_len = self.segments[self.seg_idx];
        let frac = if seg_len == 0.0 {
            0.0
        } else {
            (target - self.acc) / seg_len
        };
        let a = self.vertices[self.seg_idx];
        let b = self.vertices[self.seg_idx + 1];
        let point = Coordinate::new(a.y, a.x).interpolate(Coordinate::new(b.y, b.x), frac);

        self.k += 1;
        self.remaining -= 1;
        Some(Coordinate::new(round6(point.lat), round6(point.lon)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
