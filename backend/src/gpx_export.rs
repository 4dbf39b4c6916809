use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::{Coord, Point};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::RouteError;
use crate::models::{ResolvedPoint, RouteGeometry};

/// Base64 GPX 1.1 document with the route polyline as a single track.
pub fn encode_route_as_gpx(
    geometry: &RouteGeometry,
    from: &ResolvedPoint,
    to: &ResolvedPoint,
) -> Result<String, RouteError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("routescribe".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(format!("{} → {}", from.label, to.label)),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(geometry.line.coords().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coord<f64>) -> Waypoint {
    Waypoint::new(Point::new(coord.x, coord.y))
}
