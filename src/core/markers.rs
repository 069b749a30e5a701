//! Interactive per-complaint markers.
//!
//! Markers are never diffed: every rebuild removes all of them and creates
//! one per complaint in the new snapshot.

use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::complaint::{Complaint, ComplaintRef};
use crate::surface::{LngLat, MapSurface, MarkerId, MarkerSpec, MarkerStyle};

pub const MARKER_SIZE_PX: u32 = 12;
pub const MARKER_CLASS: &str = "complaint-marker";

#[derive(Debug, Clone)]
pub struct RenderedMarker {
    pub id: MarkerId,
    pub complaint: ComplaintRef,
}

/// Owns the markers currently on the surface and maps clicks back to
/// complaints.
#[derive(Debug, Default)]
pub struct MarkerManager {
    active: Vec<RenderedMarker>,
    by_id: HashMap<MarkerId, usize>,
}

impl MarkerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dot in the category color with a 2px halo of the same color.
    pub fn marker_spec(complaint: &Complaint) -> MarkerSpec {
        let color = complaint.color();
        MarkerSpec {
            position: LngLat::from(complaint.coordinates),
            style: MarkerStyle {
                class_name: MARKER_CLASS.to_string(),
                size_px: MARKER_SIZE_PX,
                background: color.to_string(),
                halo: Some(format!("0 0 0 2px {color}")),
                pointer_cursor: true,
            },
            interactive: true,
        }
    }

    /// Replace every marker with one per complaint in `set`.
    /// Returns the number of markers created.
    pub fn rebuild(&mut self, surface: &mut dyn MapSurface, set: &Arc<[Complaint]>) -> usize {
        self.clear(surface);
        self.active.reserve(set.len());

        for (index, complaint) in set.iter().enumerate() {
            let id = match surface.add_marker(Self::marker_spec(complaint)) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping marker for complaint {}: {}", index, e);
                    continue;
                }
            };
            let Some(complaint) = ComplaintRef::new(Arc::clone(set), index) else {
                continue;
            };
            self.by_id.insert(id, self.active.len());
            self.active.push(RenderedMarker { id, complaint });
        }

        debug!("Rebuilt {} complaint markers", self.active.len());
        self.active.len()
    }

    /// Remove every marker from the surface.
    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        for marker in self.active.drain(..) {
            surface.remove_marker(marker.id);
        }
        self.by_id.clear();
    }

    pub fn resolve_click(&self, id: MarkerId) -> Option<ComplaintRef> {
        self.by_id
            .get(&id)
            .map(|&slot| self.active[slot].complaint.clone())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedMarker> {
        self.active.iter()
    }
}
