use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;
use uuid::Uuid;

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::geo::{haversine_m, GeoPoint, Polygon};

use crate::cell::{cell_of, cell_overlaps, radius_bbox};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PointSet {
    points: HashMap<Uuid, GeoPoint>,
    cells: HashMap<String, HashSet<Uuid>>,
}

impl PointSet {
    fn upsert(&mut self, id: Uuid, location: GeoPoint) -> Result<(), ShorewatchError> {
        if !location.is_valid() {
            return Err(ShorewatchError::InvalidGeometry(format!(
                "coordinate out of range: ({}, {})",
                location.lat, location.lng
            )));
        }
        let Some(cell) = cell_of(location) else {
            return Err(ShorewatchError::InvalidGeometry(format!(
                "unencodable coordinate: ({}, {})",
                location.lat, location.lng
            )));
        };
        if let Some(previous) = self.points.insert(id, location) {
            if let Some(old_cell) = cell_of(previous) {
                if old_cell != cell {
                    self.drop_from_cell(&old_cell, id);
                }
            }
        }
        self.cells.entry(cell).or_default().insert(id);
        Ok(())
    }

    fn remove(&mut self, id: Uuid) {
        if let Some(previous) = self.points.remove(&id) {
            if let Some(cell) = cell_of(previous) {
                self.drop_from_cell(&cell, id);
            }
        }
    }

    fn drop_from_cell(&mut self, cell: &str, id: Uuid) {
        if let Some(members) = self.cells.get_mut(cell) {
            members.remove(&id);
            if members.is_empty() {
                self.cells.remove(cell);
            }
        }
    }

    /// Candidate (id, point) pairs from cells whose bbox overlaps the query
    /// box, plus the number of cells that passed the prefilter.
    fn candidates_in_box(&self, min: GeoPoint, max: GeoPoint) -> (Vec<(Uuid, GeoPoint)>, usize) {
        let mut candidates = Vec::new();
        let mut cells_hit = 0;
        for (cell, members) in &self.cells {
            if !cell_overlaps(cell, min, max) {
                continue;
            }
            cells_hit += 1;
            for id in members {
                if let Some(point) = self.points.get(id) {
                    candidates.push((*id, *point));
                }
            }
        }
        (candidates, cells_hit)
    }

    /// Ids within `radius_m` of `center`, ordered by increasing distance
    /// with id as tiebreak.
    fn within_radius(&self, center: GeoPoint, radius_m: f64) -> (Vec<Uuid>, usize, usize) {
        let (min, max) = radius_bbox(center, radius_m);
        let (candidates, cells_hit) = self.candidates_in_box(min, max);
        let tested = candidates.len();
        let mut matches: Vec<(Uuid, f64)> = candidates
            .into_iter()
            .filter_map(|(id, point)| {
                let d = haversine_m(center, point);
                (d <= radius_m).then_some((id, d))
            })
            .collect();
        matches.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        (matches.into_iter().map(|(id, _)| id).collect(), cells_hit, tested)
    }
}

#[derive(Default)]
struct IndexState {
    users: PointSet,
    reports: PointSet,
    alert_areas: HashMap<Uuid, Polygon>,
}

/// Point counts, for startup logs and sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounts {
    pub users: usize,
    pub reports: usize,
    pub alert_areas: usize,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Geohash-bucketed index over user locations, report locations, and the
/// polygons of live alerts. All methods take `&self`; writers serialize on an
/// internal lock and readers see a consistent snapshot.
pub struct SpatialIndex {
    state: RwLock<IndexState>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
        }
    }

    // --- Writes ---

    /// Record or move a user's location.
    pub fn upsert_user(&self, user_id: Uuid, location: GeoPoint) -> Result<(), ShorewatchError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.users.upsert(user_id, location)
    }

    pub fn remove_user(&self, user_id: Uuid) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.users.remove(user_id);
    }

    pub fn upsert_report(&self, report_id: Uuid, location: GeoPoint) -> Result<(), ShorewatchError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.reports.upsert(report_id, location)
    }

    pub fn remove_report(&self, report_id: Uuid) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.reports.remove(report_id);
    }

    /// Register a live alert's polygon. Validates the ring.
    pub fn insert_alert_area(&self, alert_id: Uuid, area: Polygon) -> Result<(), ShorewatchError> {
        area.validate()?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.alert_areas.insert(alert_id, area);
        Ok(())
    }

    pub fn remove_alert_area(&self, alert_id: Uuid) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.alert_areas.remove(&alert_id);
    }

    // --- Queries ---

    /// Users whose current location lies inside the polygon. Sorted by user
    /// id, no duplicates, stable for a given index snapshot. Empty index
    /// yields an empty result, not an error.
    pub fn users_in_polygon(&self, area: &Polygon) -> Result<Vec<Uuid>, ShorewatchError> {
        area.validate()?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (min, max) = area.bbox();
        let (candidates, cells_hit) = state.users.candidates_in_box(min, max);
        let tested = candidates.len();
        let mut matches: Vec<Uuid> = candidates
            .into_iter()
            .filter_map(|(id, point)| area.contains(point).then_some(id))
            .collect();
        matches.sort_unstable();
        matches.dedup();
        debug!(
            cells = cells_hit,
            tested,
            matched = matches.len(),
            "Polygon membership query"
        );
        Ok(matches)
    }

    /// Users within `radius_m` meters of `center`, closest first.
    pub fn users_within_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Uuid>, ShorewatchError> {
        validate_radius(center, radius_m)?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (matches, cells_hit, tested) = state.users.within_radius(center, radius_m);
        debug!(
            cells = cells_hit,
            tested,
            matched = matches.len(),
            radius_m,
            "User radius query"
        );
        Ok(matches)
    }

    /// Reports within `radius_m` meters of `center`, closest first.
    pub fn reports_within_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Uuid>, ShorewatchError> {
        validate_radius(center, radius_m)?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (matches, cells_hit, tested) = state.reports.within_radius(center, radius_m);
        debug!(
            cells = cells_hit,
            tested,
            matched = matches.len(),
            radius_m,
            "Report radius query"
        );
        Ok(matches)
    }

    /// Ids of registered alert polygons containing the point, sorted.
    pub fn alerts_containing(&self, point: GeoPoint) -> Result<Vec<Uuid>, ShorewatchError> {
        if !point.is_valid() {
            return Err(ShorewatchError::InvalidGeometry(format!(
                "coordinate out of range: ({}, {})",
                point.lat, point.lng
            )));
        }
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<Uuid> = state
            .alert_areas
            .iter()
            .filter(|(_, area)| {
                let (min, max) = area.bbox();
                point.lat >= min.lat
                    && point.lat <= max.lat
                    && point.lng >= min.lng
                    && point.lng <= max.lng
                    && area.contains(point)
            })
            .map(|(id, _)| *id)
            .collect();
        matches.sort_unstable();
        Ok(matches)
    }

    /// Last known location for a user, if any.
    pub fn user_location(&self, user_id: Uuid) -> Option<GeoPoint> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.users.points.get(&user_id).copied()
    }

    pub fn counts(&self) -> IndexCounts {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        IndexCounts {
            users: state.users.points.len(),
            reports: state.reports.points.len(),
            alert_areas: state.alert_areas.len(),
        }
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_radius(center: GeoPoint, radius_m: f64) -> Result<(), ShorewatchError> {
    if !center.is_valid() {
        return Err(ShorewatchError::InvalidGeometry(format!(
            "coordinate out of range: ({}, {})",
            center.lat, center.lng
        )));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(ShorewatchError::Validation(format!(
            "radius must be a non-negative number of meters, got {radius_m}"
        )));
    }
    Ok(())
}
