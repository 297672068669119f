use geohash::Coord;
use shorewatch_common::geo::GeoPoint;

/// Geohash-5 cells are roughly 5 km on a side, a good match for
/// neighborhood-scale alert polygons and the 10 km default search radius.
pub const CELL_PRECISION: usize = 5;

/// Cell id for a point. `None` for coordinates geohash cannot encode.
pub fn cell_of(point: GeoPoint) -> Option<String> {
    geohash::encode(
        Coord {
            x: point.lng,
            y: point.lat,
        },
        CELL_PRECISION,
    )
    .ok()
}

/// Whether a cell's bounding box overlaps the (min, max) query box.
pub fn cell_overlaps(cell: &str, min: GeoPoint, max: GeoPoint) -> bool {
    let Ok(rect) = geohash::decode_bbox(cell) else {
        return false;
    };
    rect.min().y <= max.lat
        && rect.max().y >= min.lat
        && rect.min().x <= max.lng
        && rect.max().x >= min.lng
}

/// Conservative bounding box around a radius disc. Uses the smallest
/// meters-per-degree-longitude inside the box so the disc is never clipped.
pub fn radius_bbox(center: GeoPoint, radius_m: f64) -> (GeoPoint, GeoPoint) {
    const METERS_PER_DEG_LAT: f64 = 111_320.0;
    let lat_margin = radius_m / METERS_PER_DEG_LAT;
    let widest_lat = (center.lat.abs() + lat_margin).min(89.9);
    let lng_margin = radius_m / (METERS_PER_DEG_LAT * widest_lat.to_radians().cos().max(0.01));
    (
        GeoPoint {
            lat: center.lat - lat_margin,
            lng: center.lng - lng_margin,
        },
        GeoPoint {
            lat: center.lat + lat_margin,
            lng: center.lng + lng_margin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_valid_point() {
        let cell = cell_of(GeoPoint {
            lat: 13.0827,
            lng: 80.2707,
        })
        .unwrap();
        assert_eq!(cell.len(), CELL_PRECISION);
    }

    #[test]
    fn cell_overlaps_own_point() {
        let p = GeoPoint {
            lat: 13.0827,
            lng: 80.2707,
        };
        let cell = cell_of(p).unwrap();
        assert!(cell_overlaps(&cell, p, p));
    }

    #[test]
    fn radius_bbox_contains_disc() {
        let center = GeoPoint {
            lat: 13.0,
            lng: 80.0,
        };
        let (min, max) = radius_bbox(center, 10_000.0);
        // 10 km is just under 0.09 degrees of latitude.
        assert!(min.lat < 12.92 && max.lat > 13.08);
        assert!(min.lng < 79.91 && max.lng > 80.09);
    }
}
