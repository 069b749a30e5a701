//! The complaint map view: wires the store, the layer synchronizer, the
//! detail panel and the pulse simulator together for one map surface.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::complaint::ComplaintRef;
use crate::config::ViewConfig;
use crate::error::DataFetchError;
use crate::layers::MapLayerSynchronizer;
use crate::proximity::NearbyQuery;
use crate::pulse::{ChainState, PulseSimulator};
use crate::selection::{DetailPanel, PanelView};
use crate::store::{ComplaintSource, ComplaintStore};
use crate::surface::{MapSurface, SurfaceEvent};

#[derive(Debug, Clone, Serialize)]
pub struct ViewStats {
    pub complaints: usize,
    pub markers: usize,
    pub pulses: usize,
    pub selected: Option<usize>,
    pub awaiting_load: bool,
}

pub struct ComplaintMapView {
    store: Arc<ComplaintStore>,
    layers: Arc<Mutex<MapLayerSynchronizer>>,
    panel: Mutex<DetailPanel>,
    pulses: PulseSimulator,
}

impl ComplaintMapView {
    /// Take ownership of `surface`, start the pulse chains and load the
    /// initial collection. A failed initial load is logged and leaves the
    /// map empty; it does not fail the mount.
    pub async fn mount<S: ComplaintSource>(
        surface: Box<dyn MapSurface>,
        source: &S,
        config: ViewConfig,
    ) -> Self {
        let store = Arc::new(ComplaintStore::new());
        let layers = Arc::new(Mutex::new(MapLayerSynchronizer::new(surface)));
        let pulses =
            PulseSimulator::start(config.pulse.clone(), Arc::clone(&store), Arc::clone(&layers));
        let panel = Mutex::new(DetailPanel::new(NearbyQuery {
            limit: config.nearby_limit,
            ..NearbyQuery::default()
        }));

        let view = Self {
            store,
            layers,
            panel,
            pulses,
        };
        // Errors are logged by the store.
        let _ = view.refresh(source).await;
        info!("Complaint map mounted");
        view
    }

    /// Reload from `source` and redraw. Returns the number of complaints now
    /// loaded; on error the previous drawing stays as it was.
    pub async fn refresh<S: ComplaintSource>(&self, source: &S) -> Result<usize, DataFetchError> {
        self.store.load(source).await?;
        // Draw the store's current snapshot while holding the layers lock, so
        // overlapping refreshes always leave the newest collection on screen.
        let mut layers = self.layers.lock().await;
        let set = self.store.snapshot().await;
        let outcome = layers.sync(Arc::clone(&set));
        debug!("Layer sync for {} complaints: {:?}", set.len(), outcome);
        Ok(set.len())
    }

    pub async fn handle_event(&self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Loaded => {
                if self.layers.lock().await.on_loaded() {
                    debug!("Applied deferred layer sync");
                }
            }
            SurfaceEvent::MarkerClicked(id) => {
                let picked = self.layers.lock().await.resolve_click(id);
                if let Some(complaint) = picked {
                    debug!("Marker {:?} selected complaint {}", id, complaint.index());
                    self.panel.lock().await.select(complaint);
                }
            }
        }
    }

    /// Select by position in the current store snapshot.
    pub async fn select_index(&self, index: usize) -> bool {
        let set = self.store.snapshot().await;
        match ComplaintRef::new(set, index) {
            Some(complaint) => {
                self.panel.lock().await.select(complaint);
                true
            }
            None => false,
        }
    }

    pub async fn select_nearby(&self, n: usize) -> bool {
        self.panel.lock().await.select_nearby(n)
    }

    pub async fn toggle_nearby(&self) -> bool {
        self.panel.lock().await.toggle_nearby()
    }

    pub async fn close_panel(&self) {
        self.panel.lock().await.close();
    }

    pub async fn selection(&self) -> Option<ComplaintRef> {
        self.panel.lock().await.selection().current().cloned()
    }

    pub async fn panel(&self) -> PanelView {
        self.panel.lock().await.render()
    }

    pub fn store(&self) -> &Arc<ComplaintStore> {
        &self.store
    }

    pub fn chain_states(&self) -> Vec<ChainState> {
        self.pulses.chain_states()
    }

    pub async fn stats(&self) -> ViewStats {
        let complaints = self.store.len().await;
        let selected = self.selection().await.map(|c| c.index());
        let layers = self.layers.lock().await;
        ViewStats {
            complaints,
            markers: layers.markers().len(),
            pulses: layers.pulse_count(),
            selected,
            awaiting_load: layers.has_pending(),
        }
    }

    /// Stop every timer, remove every marker and pulse, and destroy the
    /// surface.
    pub async fn teardown(self) {
        self.pulses.shutdown().await;
        self.layers.lock().await.release();
        info!("Complaint map torn down");
    }
}
