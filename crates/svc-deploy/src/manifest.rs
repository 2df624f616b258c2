//! Record of what the installer put on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DeployError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstallManifest {
    pub service: String,
    /// Version of the tool that performed the install.
    pub version: String,
    pub installed_at: DateTime<Utc>,
    pub source: PathBuf,
    /// Installed files, relative to the install dir.
    pub files: Vec<PathBuf>,
    pub requirements: Vec<String>,
}

impl InstallManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(DeployError::io("read", path))?;
        serde_json::from_str(&text).map_err(|source| DeployError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| DeployError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json + "\n").map_err(DeployError::io("write", path))
    }
}
