//! Daemon configuration, read from `config.json` in the data directory.

use std::path::{Path, PathBuf};

use complaint_map::config::ViewConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_BIND: &str = "127.0.0.1:9877";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bind: String,
    /// Complaint data file; defaults to `complaints.json` in the data dir.
    pub data_file: Option<PathBuf>,
    pub view: ViewConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            data_file: None,
            view: ViewConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Missing file means defaults; an unreadable or malformed one is
    /// reported and also falls back to defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<DaemonConfig>(&s).map_err(|e| e.to_string()))
        {
            Ok(cfg) => {
                info!("Loaded config from {:?}", path);
                cfg
            }
            Err(e) => {
                warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_malformed_files_use_defaults() {
        let dir = std::env::temp_dir().join(format!("complaintd_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let cfg = DaemonConfig::load(&dir.join("absent.json"));
        assert_eq!(cfg.bind, DEFAULT_BIND);

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "[1, 2").unwrap();
        assert_eq!(DaemonConfig::load(&bad).bind, DEFAULT_BIND);

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{ "bind": "0.0.0.0:7000", "view": { "zoom": 13 } }"#).unwrap();
        let cfg = DaemonConfig::load(&good);
        assert_eq!(cfg.bind, "0.0.0.0:7000");
        assert_eq!(cfg.view.zoom, 13.0);
        assert!(cfg.data_file.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
