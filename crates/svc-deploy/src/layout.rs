//! Filesystem layout of an installed service.
//!
//! Paths in [`ServicePaths`] are the ones the host sees at runtime and the
//! ones written into unit files. [`Layout::stage`] maps them under the
//! layout root, which is `/` on a real host and a scratch directory when
//! staging or testing.

use std::path::{Component, Path, PathBuf};

use crate::service::{ConfigLocation, ServiceDef};

pub const INSTALL_BASE: &str = "/opt";
pub const ETC_BASE: &str = "/etc";
pub const LOG_BASE: &str = "/var/log";
pub const UNIT_DIR: &str = "/etc/systemd/system";
pub const LOGROTATE_DIR: &str = "/etc/logrotate.d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

/// Runtime paths for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePaths {
    pub install_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub python: PathBuf,
    pub pip: PathBuf,
    pub etc_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config: PathBuf,
    pub entry: PathBuf,
    pub unit: PathBuf,
    pub logrotate: PathBuf,
    pub manifest: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_system(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Where `path` lives under this layout's root.
    pub fn stage(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }

    pub fn paths(&self, svc: &ServiceDef) -> ServicePaths {
        let install_dir = Path::new(INSTALL_BASE).join(&svc.name);
        let venv_dir = install_dir.join("venv");
        let etc_dir = Path::new(ETC_BASE).join(&svc.name);
        let config = match svc.config.location {
            ConfigLocation::Etc => etc_dir.join(&svc.config.file_name),
            ConfigLocation::Install => install_dir.join(&svc.config.file_name),
        };
        ServicePaths {
            python: venv_dir.join("bin/python"),
            pip: venv_dir.join("bin/pip"),
            entry: install_dir.join(&svc.entry),
            manifest: install_dir.join(".lnsctl-manifest.json"),
            log_dir: Path::new(LOG_BASE).join(&svc.name),
            unit: Path::new(UNIT_DIR).join(svc.unit_name()),
            logrotate: Path::new(LOGROTATE_DIR).join(&svc.name),
            config,
            etc_dir,
            venv_dir,
            install_dir,
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::builtin_services;

    #[test]
    fn test_paths_for_monitor() {
        let svc = &builtin_services()[0];
        let p = Layout::system().paths(svc);
        assert_eq!(p.install_dir, Path::new("/opt/device_monitor"));
        assert_eq!(p.python, Path::new("/opt/device_monitor/venv/bin/python"));
        assert_eq!(p.config, Path::new("/etc/device_monitor/config.yaml"));
        assert_eq!(p.log_dir, Path::new("/var/log/device_monitor"));
        assert_eq!(p.unit, Path::new("/etc/systemd/system/device_monitor.service"));
        assert_eq!(p.logrotate, Path::new("/etc/logrotate.d/device_monitor"));
    }

    #[test]
    fn test_bot_config_lives_in_install_dir() {
        let svc = &builtin_services()[1];
        let p = Layout::system().paths(svc);
        assert_eq!(p.config, Path::new("/opt/lns_project_bot/config.py"));
    }

    #[test]
    fn test_stage_under_root() {
        let layout = Layout::new("/tmp/stage");
        assert_eq!(
            layout.stage(Path::new("/etc/logrotate.d/x")),
            Path::new("/tmp/stage/etc/logrotate.d/x")
        );
        assert_eq!(Layout::system().stage(Path::new("/opt/x")), Path::new("/opt/x"));
        assert!(!layout.is_system());
    }
}
