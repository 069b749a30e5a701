//! Cross-platform application paths

use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, String> {
        let data_dir = Self::get_data_dir()?;

        // Ensure directory exists
        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory {:?}: {}", data_dir, e))?;

        Ok(Self { data_dir })
    }

    /// `COMPLAINTD_DATA_DIR` overrides the platform data dir.
    fn get_data_dir() -> Result<PathBuf, String> {
        if let Ok(dir) = std::env::var("COMPLAINTD_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::data_dir().ok_or("Could not determine data directory")?;
        Ok(base.join("complaint_map"))
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn complaints_file(&self) -> PathBuf {
        self.data_dir.join("complaints.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}
