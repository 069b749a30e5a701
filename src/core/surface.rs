//! The map rendering capability the core drives.
//!
//! Everything the visualization needs from a map engine goes through
//! [`MapSurface`]: readiness, DOM-style markers, GeoJSON sources and styled
//! layers. Input from the engine (style loaded, marker clicked) comes back as
//! [`SurfaceEvent`] values pumped into the view.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::complaint::Coordinates;
use crate::error::SurfaceError;

/// A position in the map engine's `(longitude, latitude)` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", from = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// The single place where domain `(lat, lon)` becomes render `(lon, lat)`.
impl From<Coordinates> for LngLat {
    fn from(c: Coordinates) -> Self {
        Self {
            lng: c.lon(),
            lat: c.lat(),
        }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(p: [f64; 2]) -> Self {
        Self {
            lng: p[0],
            lat: p[1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

/// Visual element attached to a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub class_name: String,
    pub size_px: u32,
    pub background: String,
    /// Box-shadow ring drawn around the dot, if any.
    pub halo: Option<String>,
    pub pointer_cursor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub position: LngLat,
    pub style: MarkerStyle,
    /// Whether the engine should report clicks on this marker.
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: LngLat },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub properties: serde_json::Map<String, Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn point(at: LngLat) -> Self {
        Self {
            properties: serde_json::Map::new(),
            geometry: Geometry::Point { coordinates: at },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Heatmap,
    Circle,
}

/// A style layer bound to a source. `paint` uses the engine's expression
/// syntax verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
    pub paint: Value,
}

/// Initial camera and style for a new surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    pub style: String,
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    /// The style finished loading; sources and layers may be attached.
    Loaded,
    MarkerClicked(MarkerId),
}

pub trait MapSurface: Send {
    fn is_loaded(&self) -> bool;

    fn add_marker(&mut self, spec: MarkerSpec) -> Result<MarkerId, SurfaceError>;

    /// Removing an unknown marker is a no-op.
    fn remove_marker(&mut self, id: MarkerId);

    fn has_source(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    /// Replace the data of an existing source in place.
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    /// Insert `layer` below the layer named `before`, or on top when absent.
    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;

    /// Release every engine resource. Called exactly once by the owner.
    fn destroy(&mut self);
}

// ═══════════════════════════════════════════════════════════════════════════
// Recording surface
// ═══════════════════════════════════════════════════════════════════════════

/// One call observed by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    AddMarker { id: MarkerId, spec: MarkerSpec },
    RemoveMarker { id: MarkerId },
    AddSource { id: String, features: usize },
    SetSourceData { id: String, features: usize },
    AddLayer { id: String, before: Option<String> },
    Destroy,
}

#[derive(Debug, Clone)]
pub struct SurfaceCall {
    pub at: Instant,
    pub op: SurfaceOp,
}

#[derive(Debug, Default)]
pub struct Recording {
    pub loaded: bool,
    pub destroyed: bool,
    pub markers: BTreeMap<MarkerId, MarkerSpec>,
    pub sources: BTreeMap<String, FeatureCollection>,
    /// Bottom to top.
    pub layers: Vec<LayerSpec>,
    pub log: Vec<SurfaceCall>,
    next_marker: u64,
}

impl Recording {
    fn record(&mut self, op: SurfaceOp) {
        self.log.push(SurfaceCall {
            at: Instant::now(),
            op,
        });
    }

    pub fn destroy_count(&self) -> usize {
        self.log
            .iter()
            .filter(|c| matches!(c.op, SurfaceOp::Destroy))
            .count()
    }
}

/// In-process [`MapSurface`] that keeps the full scene graph and a timed
/// call log. Clones share state, so a clone can observe a surface that has
/// been moved into a view.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    options: MapOptions,
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSurface {
    pub fn new(options: MapOptions) -> Self {
        Self {
            options,
            inner: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// A surface whose style is already loaded.
    pub fn loaded(options: MapOptions) -> Self {
        let s = Self::new(options);
        s.set_loaded(true);
        s
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.lock().loaded = loaded;
    }

    pub fn lock(&self) -> MutexGuard<'_, Recording> {
        // A panic while recording leaves the data intact; keep observing it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MapSurface for RecordingSurface {
    fn is_loaded(&self) -> bool {
        let r = self.lock();
        r.loaded && !r.destroyed
    }

    fn add_marker(&mut self, spec: MarkerSpec) -> Result<MarkerId, SurfaceError> {
        let mut r = self.lock();
        if r.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        r.next_marker += 1;
        let id = MarkerId(r.next_marker);
        r.markers.insert(id, spec.clone());
        r.record(SurfaceOp::AddMarker { id, spec });
        Ok(id)
    }

    fn remove_marker(&mut self, id: MarkerId) {
        let mut r = self.lock();
        if r.markers.remove(&id).is_some() {
            r.record(SurfaceOp::RemoveMarker { id });
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.lock().sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        let mut r = self.lock();
        if r.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        if r.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        let features = data.len();
        r.sources.insert(id.to_string(), data);
        r.record(SurfaceOp::AddSource {
            id: id.to_string(),
            features,
        });
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        let mut r = self.lock();
        let features = data.len();
        match r.sources.get_mut(id) {
            Some(slot) => *slot = data,
            None => return Err(SurfaceError::UnknownSource(id.to_string())),
        }
        r.record(SurfaceOp::SetSourceData {
            id: id.to_string(),
            features,
        });
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        let mut r = self.lock();
        if r.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        if !r.sources.contains_key(&layer.source) {
            return Err(SurfaceError::UnknownSource(layer.source.clone()));
        }
        if r.layers.iter().any(|l| l.id == layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id.clone()));
        }
        // The base style's labels are not modeled, so a missing `before`
        // target appends on top like the real engine does.
        let at = before
            .and_then(|b| r.layers.iter().position(|l| l.id == b))
            .unwrap_or(r.layers.len());
        let id = layer.id.clone();
        r.layers.insert(at, layer);
        r.record(SurfaceOp::AddLayer {
            id,
            before: before.map(str::to_string),
        });
        Ok(())
    }

    fn destroy(&mut self) {
        let mut r = self.lock();
        r.markers.clear();
        r.sources.clear();
        r.layers.clear();
        r.destroyed = true;
        r.record(SurfaceOp::Destroy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> MapOptions {
        MapOptions {
            style: "mapbox://styles/mapbox/light-v11".to_string(),
            center: LngLat {
                lng: -122.16966,
                lat: 37.429832,
            },
            zoom: 15.0,
        }
    }

    #[test]
    fn coordinate_swap_happens_at_conversion() {
        let c = Coordinates::new(37.43, -122.17).unwrap();
        let p = LngLat::from(c);
        assert_eq!(p.lng, -122.17);
        assert_eq!(p.lat, 37.43);
        assert_eq!(<[f64; 2]>::from(p), [-122.17, 37.43]);
    }

    #[test]
    fn feature_collection_serializes_as_geojson() {
        let fc = FeatureCollection {
            features: vec![Feature::point(LngLat {
                lng: -122.17,
                lat: 37.43,
            })],
        };
        let v = serde_json::to_value(&fc).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {},
                    "geometry": { "type": "Point", "coordinates": [-122.17, 37.43] }
                }]
            })
        );
    }

    #[test]
    fn recording_surface_rejects_duplicates_and_unknown_sources() {
        let mut s = RecordingSurface::loaded(options());
        assert_eq!(
            s.set_source_data("x", FeatureCollection::default()),
            Err(SurfaceError::UnknownSource("x".to_string()))
        );
        s.add_source("x", FeatureCollection::default()).unwrap();
        assert!(s.add_source("x", FeatureCollection::default()).is_err());

        let layer = LayerSpec {
            id: "l".to_string(),
            kind: LayerKind::Circle,
            source: "x".to_string(),
            minzoom: None,
            maxzoom: None,
            paint: serde_json::json!({}),
        };
        s.add_layer(layer.clone(), None).unwrap();
        assert_eq!(
            s.add_layer(layer, None),
            Err(SurfaceError::DuplicateLayer("l".to_string()))
        );
    }

    #[test]
    fn destroy_clears_scene_and_blocks_new_markers() {
        let mut s = RecordingSurface::loaded(options());
        let probe = s.clone();
        let spec = MarkerSpec {
            position: LngLat { lng: 0.0, lat: 0.0 },
            style: MarkerStyle {
                class_name: "m".to_string(),
                size_px: 12,
                background: "#000".to_string(),
                halo: None,
                pointer_cursor: false,
            },
            interactive: false,
        };
        s.add_marker(spec.clone()).unwrap();
        s.destroy();
        assert!(probe.lock().markers.is_empty());
        assert!(!s.is_loaded());
        assert_eq!(s.add_marker(spec), Err(SurfaceError::Destroyed));
        assert_eq!(probe.lock().destroy_count(), 1);
    }
}
