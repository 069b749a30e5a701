//! Simulated live activity.
//!
//! A few independent chains fire at random intervals. Each firing borrows a
//! random complaint for color and approximate position, shows a small pulse
//! marker next to it, and takes the marker down again after a fixed display
//! time. There is no real event stream behind this.
//!
//! Every sleep (next firing and pulse removal) races one shared
//! [`CancellationToken`], and every task is spawned on one [`TaskTracker`],
//! so shutdown leaves nothing scheduled.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::complaint::{Complaint, ComplaintRef, Coordinates};
use crate::config::PulseConfig;
use crate::layers::MapLayerSynchronizer;
use crate::prng::Prng;
use crate::store::ComplaintStore;
use crate::surface::{LngLat, MarkerSpec, MarkerStyle};

pub const PULSE_SIZE_PX: u32 = 8;
pub const PULSE_CLASS: &str = "temporary-pulse";

/// Per-chain lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Scheduled { delay: Duration },
    Fired,
    Cancelled,
}

/// A short-lived marker near, but not tied to, a real complaint.
#[derive(Debug, Clone)]
pub struct TransientPulse {
    /// Source of color and approximate location.
    pub reference: ComplaintRef,
    pub position: Coordinates,
}

impl TransientPulse {
    /// Pick a uniformly random reference and jitter its position by up to
    /// `jitter_deg / 2` on each axis. `None` when `set` is empty.
    pub fn roll(rng: &mut Prng, set: &Arc<[Complaint]>, jitter_deg: f64) -> Option<Self> {
        if set.is_empty() {
            return None;
        }
        let index = rng.gen_range_usize(0, set.len());
        let reference = ComplaintRef::new(Arc::clone(set), index)?;
        let half = jitter_deg / 2.0;
        let dlat = rng.gen_range_f64(-half, half);
        let dlon = rng.gen_range_f64(-half, half);
        let position = reference.coordinates.offset(dlat, dlon);
        Some(Self {
            reference,
            position,
        })
    }

    pub fn color(&self) -> &'static str {
        self.reference.color()
    }

    pub fn marker_spec(&self) -> MarkerSpec {
        MarkerSpec {
            position: LngLat::from(self.position),
            style: MarkerStyle {
                class_name: PULSE_CLASS.to_string(),
                size_px: PULSE_SIZE_PX,
                background: self.color().to_string(),
                halo: None,
                pointer_cursor: false,
            },
            interactive: false,
        }
    }
}

/// Delay until a chain's next firing, uniform in `[min_delay_ms, max_delay_ms)`.
pub fn roll_delay(rng: &mut Prng, cfg: &PulseConfig) -> Duration {
    Duration::from_millis(rng.gen_range_u64(cfg.min_delay_ms, cfg.max_delay_ms))
}

type ChainStates = Arc<Mutex<Vec<ChainState>>>;

/// Shared context handed to every chain task.
#[derive(Clone)]
struct ChainContext {
    cfg: PulseConfig,
    store: Arc<ComplaintStore>,
    layers: Arc<AsyncMutex<MapLayerSynchronizer>>,
    token: CancellationToken,
    tracker: TaskTracker,
    states: ChainStates,
}

impl ChainContext {
    fn set_state(&self, chain: usize, state: ChainState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = states.get_mut(chain) {
            *slot = state;
        }
    }
}

pub struct PulseSimulator {
    token: CancellationToken,
    tracker: TaskTracker,
    states: ChainStates,
}

impl PulseSimulator {
    /// Start `cfg.chains` chains. Must be called inside a tokio runtime.
    pub fn start(
        cfg: PulseConfig,
        store: Arc<ComplaintStore>,
        layers: Arc<AsyncMutex<MapLayerSynchronizer>>,
    ) -> Self {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let states: ChainStates = Arc::new(Mutex::new(vec![ChainState::Idle; cfg.chains]));

        let mut root = match cfg.seed {
            Some(seed) => Prng::new(seed),
            None => Prng::from_entropy(),
        };

        let ctx = ChainContext {
            cfg: cfg.clone(),
            store,
            layers,
            token: token.clone(),
            tracker: tracker.clone(),
            states: Arc::clone(&states),
        };

        for chain in 0..cfg.chains {
            let rng = root.fork(chain as u64);
            tracker.spawn(run_chain(chain, rng, ctx.clone()));
        }
        debug!("Started {} pulse chains", cfg.chains);

        Self {
            token,
            tracker,
            states,
        }
    }

    pub fn chain_states(&self) -> Vec<ChainState> {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every pending firing and removal and wait for all chain and
    /// removal tasks to exit. Pulses still on screen are left for the owner
    /// of the surface to clear.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Pulse chains stopped");
    }
}

impl Drop for PulseSimulator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_chain(chain: usize, mut rng: Prng, ctx: ChainContext) {
    loop {
        let delay = roll_delay(&mut rng, &ctx.cfg);
        ctx.set_state(chain, ChainState::Scheduled { delay });

        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = time::sleep(delay) => {}
        }

        ctx.set_state(chain, ChainState::Fired);
        fire(chain, &mut rng, &ctx).await;
    }
    ctx.set_state(chain, ChainState::Cancelled);
}

async fn fire(chain: usize, rng: &mut Prng, ctx: &ChainContext) {
    let set = ctx.store.snapshot().await;
    let Some(pulse) = TransientPulse::roll(rng, &set, ctx.cfg.jitter_deg) else {
        trace!("Pulse chain {} fired with no complaints loaded; skipping", chain);
        return;
    };

    let Some(id) = ctx.layers.lock().await.show_pulse(&pulse) else {
        return;
    };
    trace!(
        "Pulse chain {} showed pulse {:?} near complaint {}",
        chain,
        id,
        pulse.reference.index()
    );

    let layers = Arc::clone(&ctx.layers);
    let token = ctx.token.clone();
    let display = ctx.cfg.display();
    ctx.tracker.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = time::sleep(display) => {
                layers.lock().await.clear_pulse(id);
            }
        }
    });
}
