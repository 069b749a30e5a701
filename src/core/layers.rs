//! Translates the complaint store into render primitives.
//!
//! The synchronizer is the sole owner of the map surface. Markers, the
//! heatmap source and its two layers, and transient pulses are all drawn
//! through it, and it destroys the surface exactly once on release.

use std::sync::Arc;

use hashbrown::HashSet;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::complaint::{Complaint, ComplaintRef};
use crate::markers::MarkerManager;
use crate::pulse::TransientPulse;
use crate::surface::{
    Feature, FeatureCollection, LayerKind, LayerSpec, LngLat, MapSurface, MarkerId,
};

pub const SOURCE_ID: &str = "complaints";
pub const HEAT_LAYER_ID: &str = "complaints-heat";
pub const POINT_LAYER_ID: &str = "complaints-point";
/// Base-style layer the complaint layers are inserted beneath.
pub const BEFORE_LAYER_ID: &str = "waterway-label";

/// Point layer only shows from this zoom up; the heatmap fades out by 15.
pub const POINT_MIN_ZOOM: f64 = 14.0;
pub const HEAT_MAX_ZOOM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// The surface is still loading; the update runs on [`MapLayerSynchronizer::on_loaded`].
    Deferred,
    Released,
}

pub struct MapLayerSynchronizer {
    surface: Box<dyn MapSurface>,
    markers: MarkerManager,
    pulses: HashSet<MarkerId>,
    pending: Option<Arc<[Complaint]>>,
    released: bool,
}

impl MapLayerSynchronizer {
    pub fn new(surface: Box<dyn MapSurface>) -> Self {
        Self {
            surface,
            markers: MarkerManager::new(),
            pulses: HashSet::new(),
            pending: None,
            released: false,
        }
    }

    /// Bring markers and the heatmap source in line with `set`.
    ///
    /// Existing markers are removed immediately. If the surface has not
    /// finished loading, a single deferred update is kept and later syncs
    /// only swap the snapshot it will apply.
    pub fn sync(&mut self, set: Arc<[Complaint]>) -> SyncOutcome {
        if self.released {
            return SyncOutcome::Released;
        }
        self.markers.clear(self.surface.as_mut());

        if self.surface.is_loaded() {
            self.pending = None;
            self.apply(&set);
            SyncOutcome::Applied
        } else {
            if self.pending.is_none() {
                debug!("Map surface not loaded; deferring layer sync until load");
            }
            self.pending = Some(set);
            SyncOutcome::Deferred
        }
    }

    /// Handle the surface's load event. Returns whether a deferred update ran.
    pub fn on_loaded(&mut self) -> bool {
        if self.released {
            return false;
        }
        match self.pending.take() {
            Some(set) => {
                self.apply(&set);
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn apply(&mut self, set: &Arc<[Complaint]>) {
        self.markers.rebuild(self.surface.as_mut(), set);
        self.upsert_source(set);
    }

    fn upsert_source(&mut self, set: &[Complaint]) {
        let data = Self::feature_collection(set);

        if self.surface.has_source(SOURCE_ID) {
            if let Err(e) = self.surface.set_source_data(SOURCE_ID, data) {
                warn!("Failed to update complaint source: {}", e);
            }
            return;
        }

        if let Err(e) = self.surface.add_source(SOURCE_ID, data) {
            warn!("Failed to add complaint source: {}", e);
            return;
        }
        for layer in [Self::heatmap_layer(), Self::point_layer()] {
            let id = layer.id.clone();
            if let Err(e) = self.surface.add_layer(layer, Some(BEFORE_LAYER_ID)) {
                warn!("Failed to add layer {}: {}", id, e);
            }
        }
        info!("Attached complaint heatmap and point layers");
    }

    pub fn feature_collection(set: &[Complaint]) -> FeatureCollection {
        FeatureCollection {
            features: set
                .iter()
                .map(|c| Feature::point(LngLat::from(c.coordinates)))
                .collect(),
        }
    }

    pub fn heatmap_layer() -> LayerSpec {
        LayerSpec {
            id: HEAT_LAYER_ID.to_string(),
            kind: LayerKind::Heatmap,
            source: SOURCE_ID.to_string(),
            minzoom: None,
            maxzoom: Some(HEAT_MAX_ZOOM),
            paint: json!({
                "heatmap-weight": 1,
                "heatmap-intensity": ["interpolate", ["linear"], ["zoom"], 0, 1, 15, 3],
                "heatmap-color": [
                    "interpolate",
                    ["linear"],
                    ["heatmap-density"],
                    0, "rgba(67,160,71,0)",
                    0.2, "rgb(102,187,106)",
                    0.4, "rgb(129,199,132)",
                    0.6, "rgb(165,214,167)",
                    0.8, "rgb(200,230,201)",
                    1, "rgb(67,160,71)"
                ],
                "heatmap-radius": ["interpolate", ["linear"], ["zoom"], 0, 2, 15, 20],
                "heatmap-opacity": ["interpolate", ["linear"], ["zoom"], 13, 1, 15, 0]
            }),
        }
    }

    pub fn point_layer() -> LayerSpec {
        LayerSpec {
            id: POINT_LAYER_ID.to_string(),
            kind: LayerKind::Circle,
            source: SOURCE_ID.to_string(),
            minzoom: Some(POINT_MIN_ZOOM),
            maxzoom: None,
            paint: json!({
                "circle-radius": 6,
                "circle-color": "#2E7D32",
                "circle-stroke-width": 0.5,
                "circle-stroke-color": "#4CAF50",
                "circle-opacity": 0.8
            }),
        }
    }

    pub fn resolve_click(&self, id: MarkerId) -> Option<ComplaintRef> {
        self.markers.resolve_click(id)
    }

    pub fn markers(&self) -> &MarkerManager {
        &self.markers
    }

    pub fn show_pulse(&mut self, pulse: &TransientPulse) -> Option<MarkerId> {
        if self.released {
            return None;
        }
        match self.surface.add_marker(pulse.marker_spec()) {
            Ok(id) => {
                self.pulses.insert(id);
                Some(id)
            }
            Err(e) => {
                warn!("Failed to show pulse: {}", e);
                None
            }
        }
    }

    pub fn clear_pulse(&mut self, id: MarkerId) {
        if self.pulses.remove(&id) {
            self.surface.remove_marker(id);
        }
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.len()
    }

    /// Remove everything drawn and destroy the surface. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.markers.clear(self.surface.as_mut());
        for id in self.pulses.drain() {
            self.surface.remove_marker(id);
        }
        self.pending = None;
        self.surface.destroy();
        self.released = true;
        info!("Map surface released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MapLayerSynchronizer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::sample;
    use crate::config::ViewConfig;
    use crate::surface::{RecordingSurface, SurfaceOp};

    fn set() -> Arc<[Complaint]> {
        vec![
            sample("Illegal Dumping", 37.43, -122.17),
            sample("Air Quality", 37.4301, -122.1701),
        ]
        .into()
    }

    #[test]
    fn repeated_sync_keeps_one_source_and_two_layers() {
        let surface = RecordingSurface::loaded(ViewConfig::default().map_options());
        let probe = surface.clone();
        let mut sync = MapLayerSynchronizer::new(Box::new(surface));

        assert_eq!(sync.sync(set()), SyncOutcome::Applied);
        assert_eq!(sync.sync(set()), SyncOutcome::Applied);
        assert_eq!(sync.sync(set()), SyncOutcome::Applied);

        let r = probe.lock();
        assert_eq!(r.sources.len(), 1);
        assert_eq!(r.sources[SOURCE_ID].len(), 2);
        let ids: Vec<&str> = r.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![HEAT_LAYER_ID, POINT_LAYER_ID]);
        assert_eq!(r.markers.len(), 2);

        let adds = r
            .log
            .iter()
            .filter(|c| matches!(c.op, SurfaceOp::AddSource { .. }))
            .count();
        let updates = r
            .log
            .iter()
            .filter(|c| matches!(c.op, SurfaceOp::SetSourceData { .. }))
            .count();
        assert_eq!((adds, updates), (1, 2));
    }

    #[test]
    fn source_data_is_replaced_in_place() {
        let surface = RecordingSurface::loaded(ViewConfig::default().map_options());
        let probe = surface.clone();
        let mut sync = MapLayerSynchronizer::new(Box::new(surface));

        sync.sync(set());
        let one: Arc<[Complaint]> = vec![sample("Air Pollution", 1.0, 2.0)].into();
        sync.sync(one);

        let r = probe.lock();
        let data = &r.sources[SOURCE_ID];
        assert_eq!(data.len(), 1);
        assert_eq!(
            serde_json::to_value(&data.features[0].geometry).unwrap()["coordinates"],
            json!([2.0, 1.0])
        );
        assert_eq!(r.markers.len(), 1);
    }

    #[test]
    fn defers_until_loaded_and_applies_once_with_latest_data() {
        let surface = RecordingSurface::new(ViewConfig::default().map_options());
        let probe = surface.clone();
        let mut sync = MapLayerSynchronizer::new(Box::new(surface));

        assert_eq!(sync.sync(set()), SyncOutcome::Deferred);
        let one: Arc<[Complaint]> = vec![sample("Air Pollution", 1.0, 2.0)].into();
        assert_eq!(sync.sync(one), SyncOutcome::Deferred);
        assert!(probe.lock().sources.is_empty());
        assert!(probe.lock().markers.is_empty());

        probe.set_loaded(true);
        assert!(sync.on_loaded());
        assert!(!sync.on_loaded());

        let r = probe.lock();
        assert_eq!(r.sources[SOURCE_ID].len(), 1);
        assert_eq!(r.layers.len(), 2);
        assert_eq!(r.markers.len(), 1);
    }

    #[test]
    fn layer_specs_match_zoom_ranges() {
        let heat = MapLayerSynchronizer::heatmap_layer();
        assert_eq!(heat.kind, LayerKind::Heatmap);
        assert_eq!(heat.maxzoom, Some(15.0));
        assert_eq!(heat.paint["heatmap-weight"], json!(1));
        assert_eq!(heat.paint["heatmap-color"][4], json!("rgba(67,160,71,0)"));

        let point = MapLayerSynchronizer::point_layer();
        assert_eq!(point.kind, LayerKind::Circle);
        assert_eq!(point.minzoom, Some(14.0));
        assert_eq!(point.paint["circle-radius"], json!(6));
    }

    #[test]
    fn release_destroys_surface_once() {
        let surface = RecordingSurface::loaded(ViewConfig::default().map_options());
        let probe = surface.clone();
        let mut sync = MapLayerSynchronizer::new(Box::new(surface));
        sync.sync(set());

        sync.release();
        sync.release();
        assert!(sync.is_released());
        assert_eq!(sync.sync(set()), SyncOutcome::Released);
        drop(sync);

        let r = probe.lock();
        assert_eq!(r.destroy_count(), 1);
        assert!(r.markers.is_empty());
    }
}
