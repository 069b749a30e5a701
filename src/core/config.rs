//! View configuration. Defaults match the Stanford-area deployment; each
//! value can be overridden through environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proximity::DEFAULT_NEARBY_LIMIT;
use crate::surface::{LngLat, MapOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub style: String,
    /// `[lon, lat]`, as the map engine expects it.
    pub center: LngLat,
    pub zoom: f64,
    pub nearby_limit: usize,
    pub pulse: PulseConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            style: "mapbox://styles/mapbox/light-v11".to_string(),
            center: LngLat {
                lng: -122.169660,
                lat: 37.429832,
            },
            zoom: 15.0,
            nearby_limit: DEFAULT_NEARBY_LIMIT,
            pulse: PulseConfig::default(),
        }
    }
}

impl ViewConfig {
    /// Defaults with `COMPLAINT_MAP_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        if let Ok(style) = std::env::var("COMPLAINT_MAP_STYLE") {
            self.style = style;
        }
        if let Some(lat) = env_parse("COMPLAINT_MAP_CENTER_LAT") {
            self.center.lat = lat;
        }
        if let Some(lon) = env_parse("COMPLAINT_MAP_CENTER_LON") {
            self.center.lng = lon;
        }
        if let Some(zoom) = env_parse("COMPLAINT_MAP_ZOOM") {
            self.zoom = zoom;
        }
        if let Some(seed) = env_parse("COMPLAINT_MAP_SEED") {
            self.pulse.seed = Some(seed);
        }
    }

    pub fn map_options(&self) -> MapOptions {
        MapOptions {
            style: self.style.clone(),
            center: self.center,
            zoom: self.zoom,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Timing and placement of simulated activity pulses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Number of independent pulse chains.
    pub chains: usize,
    /// Delay between firings is uniform in `[min_delay_ms, max_delay_ms)`.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub display_ms: u64,
    /// Full width of the jitter window; each axis moves by at most half.
    pub jitter_deg: f64,
    pub seed: Option<u64>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            chains: 3,
            min_delay_ms: 1000,
            max_delay_ms: 10_000,
            display_ms: 2000,
            jitter_deg: 0.001,
            seed: None,
        }
    }
}

impl PulseConfig {
    pub fn display(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }
}
