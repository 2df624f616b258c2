//! `lnsctl.toml` configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use svc_deploy::{builtin_services, find_service, ServiceDef};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployConfig {
    /// Interpreter used to create each service's virtualenv.
    #[serde(default = "DeployConfig::default_python")]
    pub python: String,
    /// Managed services. Empty means the built-in monitor and bot.
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl DeployConfig {
    fn default_python() -> String { "python3".into() }

    /// Load `path`, falling back to the built-in services when the file does
    /// not exist or lists none.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using built-in services");
            return Ok(Self::default_example());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut cfg: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        if cfg.services.is_empty() {
            cfg.services = builtin_services();
        }
        for svc in &cfg.services {
            svc.validate()
                .with_context(|| format!("in config file {}", path.display()))?;
        }
        Ok(cfg)
    }

    pub fn default_example() -> Self {
        Self {
            python: Self::default_python(),
            services: builtin_services(),
        }
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDef> {
        Ok(find_service(&self.services, name)?)
    }
}
