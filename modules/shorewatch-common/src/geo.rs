use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ShorewatchError;

// --- Points ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Finite coordinates within the valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Same distance in meters. Radius queries are specified in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a, b) * 1000.0
}

// --- Polygons ---

/// A simple polygon: an ordered ring of vertices, implicitly closed (the last
/// vertex connects back to the first). A repeated closing vertex is tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Polygon {
    pub ring: Vec<GeoPoint>,
}

impl Polygon {
    /// Checks that the ring describes a usable region: at least three
    /// distinct vertices, every coordinate finite and in range, and no two
    /// non-adjacent edges intersecting. Consecutive duplicate vertices and a
    /// repeated closing vertex are dropped before the edge scan.
    pub fn validate(&self) -> Result<(), ShorewatchError> {
        for v in &self.ring {
            if !v.is_valid() {
                return Err(ShorewatchError::InvalidGeometry(format!(
                    "coordinate out of range: ({}, {})",
                    v.lat, v.lng
                )));
            }
        }

        let ring = self.normalized();
        let mut distinct: Vec<GeoPoint> = Vec::new();
        for v in &ring {
            if !distinct.contains(v) {
                distinct.push(*v);
            }
        }
        if distinct.len() < 3 {
            return Err(ShorewatchError::InvalidGeometry(format!(
                "polygon needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }

        let n = ring.len();
        for i in 0..n {
            for j in (i + 1)..n {
                // Adjacent edges share a vertex and always touch.
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let (a1, a2) = (ring[i], ring[(i + 1) % n]);
                let (b1, b2) = (ring[j], ring[(j + 1) % n]);
                if segments_intersect(a1, a2, b1, b2) {
                    return Err(ShorewatchError::InvalidGeometry(format!(
                        "self-intersecting ring: edge {i} crosses edge {j}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn normalized(&self) -> Vec<GeoPoint> {
        let mut out: Vec<GeoPoint> = Vec::with_capacity(self.ring.len());
        for v in &self.ring {
            if out.last() == Some(v) {
                continue;
            }
            out.push(*v);
        }
        if out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        out
    }

    /// Even-odd ray-casting membership test. Boundary behavior is
    /// deterministic for a given ring but not contractual.
    pub fn contains(&self, p: GeoPoint) -> bool {
        let n = self.ring.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (self.ring[i], self.ring[j]);
            if (vi.lat > p.lat) != (vj.lat > p.lat)
                && p.lng < (vj.lng - vi.lng) * (p.lat - vi.lat) / (vj.lat - vi.lat) + vi.lng
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Axis-aligned bounding box as (min, max) corners. Inverted (matches
    /// nothing) for an empty ring.
    pub fn bbox(&self) -> (GeoPoint, GeoPoint) {
        let mut min = GeoPoint {
            lat: f64::INFINITY,
            lng: f64::INFINITY,
        };
        let mut max = GeoPoint {
            lat: f64::NEG_INFINITY,
            lng: f64::NEG_INFINITY,
        };
        for v in &self.ring {
            min.lat = min.lat.min(v.lat);
            min.lng = min.lng.min(v.lng);
            max.lat = max.lat.max(v.lat);
            max.lng = max.lng.max(v.lng);
        }
        (min, max)
    }
}

fn orient(a: GeoPoint, b: GeoPoint, c: GeoPoint) -> f64 {
    (b.lng - a.lng) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lng - a.lng)
}

fn on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> bool {
    p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(p1: GeoPoint, p2: GeoPoint, q1: GeoPoint, q2: GeoPoint) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return true;
    }
    // Collinear touch between non-adjacent edges is still degenerate.
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
