//! Service installer.
//!
//! An install is a fixed sequence of [`Step`]s. The first failing step
//! aborts the install; whatever earlier steps created stays on disk, and
//! re-running the installer picks up from there.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::copy::copy_file_set;
use crate::error::{DeployError, Result};
use crate::host::{Host, Invocation};
use crate::layout::{Layout, ServicePaths};
use crate::manifest::InstallManifest;
use crate::service::ServiceDef;
use crate::unit::{exec_start_program, UnitFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CheckPrivilege,
    CreateLayout,
    EnsureAccount,
    CopyFiles,
    ProvisionRuntime,
    WriteConfig,
    WriteUnit,
    WriteLogrotate,
    VerifyExecStart,
    WriteManifest,
    Activate,
}

impl Step {
    pub const ALL: [Step; 11] = [
        Step::CheckPrivilege,
        Step::CreateLayout,
        Step::EnsureAccount,
        Step::CopyFiles,
        Step::ProvisionRuntime,
        Step::WriteConfig,
        Step::WriteUnit,
        Step::WriteLogrotate,
        Step::VerifyExecStart,
        Step::WriteManifest,
        Step::Activate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Step::CheckPrivilege => "Checking privileges",
            Step::CreateLayout => "Creating directories",
            Step::EnsureAccount => "Setting up service account",
            Step::CopyFiles => "Copying application files",
            Step::ProvisionRuntime => "Provisioning Python environment",
            Step::WriteConfig => "Writing config",
            Step::WriteUnit => "Writing systemd unit",
            Step::WriteLogrotate => "Writing logrotate policy",
            Step::VerifyExecStart => "Verifying ExecStart",
            Step::WriteManifest => "Writing install manifest",
            Step::Activate => "Enabling service",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped(String),
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub outcomes: Vec<(Step, StepOutcome)>,
}

impl InstallReport {
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }
}

pub struct Installer<'a, H: Host> {
    host: &'a H,
    layout: &'a Layout,
    svc: &'a ServiceDef,
    paths: ServicePaths,
    source: PathBuf,
    python: String,
    enable_now: bool,
    version: String,
    copied: Vec<PathBuf>,
}

impl<'a, H: Host> Installer<'a, H> {
    pub fn new(host: &'a H, layout: &'a Layout, svc: &'a ServiceDef, source: impl Into<PathBuf>) -> Result<Self> {
        svc.validate()?;
        Ok(Self {
            host,
            layout,
            svc,
            paths: layout.paths(svc),
            source: source.into(),
            python: "python3".into(),
            enable_now: false,
            version: env!("CARGO_PKG_VERSION").into(),
            copied: Vec::new(),
        })
    }

    /// Interpreter used to create the virtual environment.
    pub fn python(mut self, interpreter: impl Into<String>) -> Self {
        self.python = interpreter.into();
        self
    }

    /// Start the service as part of enabling it.
    pub fn enable_now(mut self, now: bool) -> Self {
        self.enable_now = now;
        self
    }

    /// Version recorded in the install manifest.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn paths(&self) -> &ServicePaths {
        &self.paths
    }

    /// Run every step in order, stopping at the first error.
    pub fn run(&mut self) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        for step in Step::ALL {
            let outcome = self.run_step(step)?;
            report.outcomes.push((step, outcome));
        }
        Ok(report)
    }

    pub fn run_step(&mut self, step: Step) -> Result<StepOutcome> {
        debug!(service = %self.svc.name, step = ?step, "install step");
        match step {
            Step::CheckPrivilege => self.check_privilege(),
            Step::CreateLayout => self.create_layout(),
            Step::EnsureAccount => self.ensure_account(),
            Step::CopyFiles => self.copy_files(),
            Step::ProvisionRuntime => self.provision_runtime(),
            Step::WriteConfig => self.write_config(),
            Step::WriteUnit => self.write_unit(),
            Step::WriteLogrotate => self.write_logrotate(),
            Step::VerifyExecStart => self.verify_exec_start(),
            Step::WriteManifest => self.write_manifest(),
            Step::Activate => self.activate(),
        }
    }

    fn staged(&self, path: &Path) -> PathBuf {
        self.layout.stage(path)
    }

    fn owner(&self) -> String {
        format!("{}:{}", self.svc.user(), self.svc.group())
    }

    fn check_privilege(&self) -> Result<StepOutcome> {
        if !self.host.is_privileged() {
            return Err(DeployError::NotPrivileged(format!("install {}", self.svc.name)));
        }
        Ok(StepOutcome::Done)
    }

    fn create_layout(&self) -> Result<StepOutcome> {
        for dir in [&self.paths.install_dir, &self.paths.etc_dir, &self.paths.log_dir] {
            let dir = self.staged(dir);
            fs::create_dir_all(&dir).map_err(DeployError::io("create", &dir))?;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o755))
                .map_err(DeployError::io("set permissions on", &dir))?;
        }
        Ok(StepOutcome::Done)
    }

    fn ensure_account(&self) -> Result<StepOutcome> {
        let user = self.svc.user();
        let group = self.svc.group();

        if group != user {
            let exists = self
                .host
                .run_quiet(&Invocation::new("getent").args(["group", group]))?
                == 0;
            if !exists {
                self.host.check(&Invocation::new("groupadd").args(["--system", group]))?;
            }
        }

        let exists = self.host.run_quiet(&Invocation::new("id").args(["-u", user]))? == 0;
        if exists {
            debug!(user, "service account exists");
        } else {
            let useradd = Invocation::new("useradd")
                .args(["--system", "--no-create-home", "--home-dir"])
                .arg(self.paths.install_dir.display().to_string())
                .args(["--shell", "/usr/sbin/nologin"]);
            let useradd = if group == user {
                useradd.arg("--user-group")
            } else {
                useradd.args(["--gid", group])
            };
            self.host.check(&useradd.arg(user))?;
            info!(user, "created service account");
        }

        let chown = Invocation::new("chown")
            .arg("-R")
            .arg(self.owner())
            .arg(self.staged(&self.paths.etc_dir).display().to_string())
            .arg(self.staged(&self.paths.log_dir).display().to_string());
        self.host.check(&chown)?;
        Ok(StepOutcome::Done)
    }

    fn copy_files(&mut self) -> Result<StepOutcome> {
        let install_dir = self.staged(&self.paths.install_dir);
        self.copied = copy_file_set(&self.source, &install_dir, &self.svc.files)?;

        let entry = self.staged(&self.paths.entry);
        if !entry.is_file() {
            return Err(DeployError::MissingSource {
                root: self.source.clone(),
                entry: self.svc.entry.clone(),
            });
        }
        fs::set_permissions(&entry, fs::Permissions::from_mode(0o755))
            .map_err(DeployError::io("set permissions on", &entry))?;
        info!(files = self.copied.len(), to = %install_dir.display(), "copied application files");
        Ok(StepOutcome::Done)
    }

    fn provision_runtime(&self) -> Result<StepOutcome> {
        let venv = self.staged(&self.paths.venv_dir);
        if self.staged(&self.paths.python).exists() {
            debug!(venv = %venv.display(), "reusing virtual environment");
        } else {
            self.host.check(
                &Invocation::new(&self.python)
                    .args(["-m", "venv"])
                    .arg(venv.display().to_string()),
            )?;
        }

        let pip = self.staged(&self.paths.pip).display().to_string();
        self.host.check(&Invocation::new(&pip).args(["install", "--upgrade", "pip"]))?;
        if !self.svc.requirements.is_empty() {
            self.host.check(
                &Invocation::new(&pip)
                    .arg("install")
                    .args(self.svc.requirements.iter().cloned()),
            )?;
        }
        Ok(StepOutcome::Done)
    }

    fn write_config(&self) -> Result<StepOutcome> {
        let config = self.staged(&self.paths.config);
        if config.exists() {
            warn!(path = %config.display(), "config exists, keeping it");
            return Ok(StepOutcome::Skipped(format!("kept existing {}", self.paths.config.display())));
        }

        let template = self
            .svc
            .config
            .template
            .as_ref()
            .map(|t| self.source.join(t))
            .filter(|t| t.is_file());
        let contents = match &template {
            Some(path) => fs::read(path).map_err(DeployError::io("read", path))?,
            None => self.svc.config.default_contents.clone().into_bytes(),
        };

        if let Some(parent) = config.parent() {
            fs::create_dir_all(parent).map_err(DeployError::io("create", parent))?;
        }
        fs::write(&config, contents).map_err(DeployError::io("write", &config))?;
        fs::set_permissions(&config, fs::Permissions::from_mode(0o640))
            .map_err(DeployError::io("set permissions on", &config))?;
        self.host.check(
            &Invocation::new("chown")
                .arg(self.owner())
                .arg(config.display().to_string()),
        )?;
        info!(path = %config.display(), from_template = template.is_some(), "wrote config");
        Ok(StepOutcome::Done)
    }

    fn write_unit(&self) -> Result<StepOutcome> {
        let text = UnitFile::for_service(self.svc, &self.paths).render();
        self.write_system_file(&self.paths.unit, &text)
    }

    fn write_logrotate(&self) -> Result<StepOutcome> {
        let text = self
            .svc
            .logrotate
            .render(&self.paths.log_dir, self.svc.user(), self.svc.group());
        self.write_system_file(&self.paths.logrotate, &text)
    }

    fn write_system_file(&self, path: &Path, text: &str) -> Result<StepOutcome> {
        let staged = self.staged(path);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).map_err(DeployError::io("create", parent))?;
        }
        fs::write(&staged, text).map_err(DeployError::io("write", &staged))?;
        fs::set_permissions(&staged, fs::Permissions::from_mode(0o644))
            .map_err(DeployError::io("set permissions on", &staged))?;
        info!(path = %staged.display(), "wrote");
        Ok(StepOutcome::Done)
    }

    fn verify_exec_start(&self) -> Result<StepOutcome> {
        let unit = self.staged(&self.paths.unit);
        let text = fs::read_to_string(&unit).map_err(DeployError::io("read", &unit))?;
        let program = exec_start_program(&text)
            .ok_or_else(|| DeployError::ExecStartMissing(self.paths.unit.clone()))?;

        let executable = fs::metadata(self.staged(&program))
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if executable {
            Ok(StepOutcome::Done)
        } else if self.host.dry_run() {
            Ok(StepOutcome::Skipped(format!("{} not created in a dry run", program.display())))
        } else {
            Err(DeployError::ExecStartMissing(program))
        }
    }

    fn write_manifest(&self) -> Result<StepOutcome> {
        let manifest = InstallManifest {
            service: self.svc.name.clone(),
            version: self.version.clone(),
            installed_at: Utc::now(),
            source: self.source.canonicalize().unwrap_or_else(|_| self.source.clone()),
            files: self.copied.clone(),
            requirements: self.svc.requirements.clone(),
        };
        manifest.save(&self.staged(&self.paths.manifest))?;
        Ok(StepOutcome::Done)
    }

    fn activate(&self) -> Result<StepOutcome> {
        self.host.check(&Invocation::new("systemctl").arg("daemon-reload"))?;
        let mut enable = Invocation::new("systemctl").arg("enable");
        if self.enable_now {
            enable = enable.arg("--now");
        }
        self.host.check(&enable.arg(&self.svc.name))?;
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::service::builtin_services;
    use tempfile::{tempdir, TempDir};

    fn monitor() -> ServiceDef {
        builtin_services().remove(0)
    }

    fn source_tree() -> TempDir {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("scripts")).unwrap();
        fs::create_dir_all(src.path().join("device")).unwrap();
        fs::write(src.path().join("scripts/device_monitor.py"), "#!/usr/bin/env python3\n").unwrap();
        fs::write(src.path().join("device/__init__.py"), "").unwrap();
        fs::write(src.path().join("device/device_client.py"), "# client\n").unwrap();
        fs::write(src.path().join("udp_server.py"), "# emulator\n").unwrap();
        src
    }

    fn fake_venv(layout: &Layout, svc: &ServiceDef) {
        let python = layout.stage(&layout.paths(svc).python);
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, "").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_unprivileged_install_touches_nothing() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::unprivileged();

        let err = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .run()
            .unwrap_err();

        assert!(matches!(err, DeployError::NotPrivileged(_)));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn test_full_install() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new();

        let report = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .version("9.9.9")
            .run()
            .unwrap();
        assert_eq!(report.outcomes.len(), Step::ALL.len());

        let staged = |p: &str| root.path().join(p);
        assert!(staged("opt/device_monitor/device/device_client.py").is_file());
        assert!(staged("opt/device_monitor/udp_server.py").is_file());
        let mode = fs::metadata(staged("opt/device_monitor/scripts/device_monitor.py"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(staged("var/log/device_monitor").is_dir());

        let unit = fs::read_to_string(staged("etc/systemd/system/device_monitor.service")).unwrap();
        assert!(unit.contains("ExecStart=/opt/device_monitor/venv/bin/python"));
        let logrotate = fs::read_to_string(staged("etc/logrotate.d/device_monitor")).unwrap();
        assert!(logrotate.starts_with("/var/log/device_monitor/*.log {"));

        // no template in the source tree: built-in defaults
        let config = fs::read_to_string(staged("etc/device_monitor/config.yaml")).unwrap();
        assert!(config.contains("interface: udp"));

        let manifest = InstallManifest::load(&staged("opt/device_monitor/.lnsctl-manifest.json")).unwrap();
        assert_eq!(manifest.version, "9.9.9");
        assert_eq!(manifest.files.len(), 4);

        // venv python is never created by a recording host
        assert!(matches!(
            report.outcome(Step::VerifyExecStart),
            Some(StepOutcome::Skipped(_))
        ));

        let venv = staged("opt/device_monitor/venv");
        let pip = venv.join("bin/pip");
        assert_eq!(
            host.commands(),
            vec![
                "id -u device_monitor".to_string(),
                format!(
                    "chown -R device_monitor:device_monitor {} {}",
                    staged("etc/device_monitor").display(),
                    staged("var/log/device_monitor").display()
                ),
                format!("python3 -m venv {}", venv.display()),
                format!("{} install --upgrade pip", pip.display()),
                format!("{} install pyserial>=3.5 pyyaml>=6.0", pip.display()),
                format!(
                    "chown device_monitor:device_monitor {}",
                    staged("etc/device_monitor/config.yaml").display()
                ),
                "systemctl daemon-reload".to_string(),
                "systemctl enable device_monitor".to_string(),
            ]
        );
    }

    #[test]
    fn test_exec_start_verified_when_live() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();

        // nothing creates the venv: a live install must fail
        let host = RecordingHost::new().live();
        let err = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .run()
            .unwrap_err();
        match err {
            DeployError::ExecStartMissing(p) => {
                assert_eq!(p, Path::new("/opt/device_monitor/venv/bin/python"))
            }
            other => panic!("unexpected error: {other}"),
        }

        fake_venv(&layout, &svc);
        let host = RecordingHost::new().live();
        let report = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.outcome(Step::VerifyExecStart), Some(&StepOutcome::Done));
        // existing venv is reused
        assert!(!host.commands().iter().any(|c| c.contains("-m venv")));
    }

    #[test]
    fn test_rerun_keeps_edited_config() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new();

        Installer::new(&host, &layout, &svc, src.path()).unwrap().run().unwrap();
        let config = root.path().join("etc/device_monitor/config.yaml");
        fs::write(&config, "device:\n  interface: serial\n").unwrap();

        let report = Installer::new(&host, &layout, &svc, src.path()).unwrap().run().unwrap();
        assert!(matches!(report.outcome(Step::WriteConfig), Some(StepOutcome::Skipped(_))));
        assert_eq!(fs::read_to_string(&config).unwrap(), "device:\n  interface: serial\n");
    }

    #[test]
    fn test_config_template_from_source() {
        let root = tempdir().unwrap();
        let src = source_tree();
        fs::create_dir_all(src.path().join("config")).unwrap();
        fs::write(src.path().join("config/default.yaml"), "device:\n  port: 10001\n").unwrap();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new();

        Installer::new(&host, &layout, &svc, src.path()).unwrap().run().unwrap();
        let config = root.path().join("etc/device_monitor/config.yaml");
        assert_eq!(fs::read_to_string(&config).unwrap(), "device:\n  port: 10001\n");
        assert_eq!(fs::metadata(&config).unwrap().permissions().mode() & 0o777, 0o640);
    }

    #[test]
    fn test_missing_account_is_created() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new().with_exit("id", 1);

        let mut installer = Installer::new(&host, &layout, &svc, src.path()).unwrap();
        installer.run_step(Step::CreateLayout).unwrap();
        installer.run_step(Step::EnsureAccount).unwrap();

        assert_eq!(
            host.commands()[1],
            "useradd --system --no-create-home --home-dir /opt/device_monitor --shell /usr/sbin/nologin --user-group device_monitor"
        );
    }

    #[test]
    fn test_failing_command_aborts() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new().with_exit("python3", 1);

        let err = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, DeployError::CommandFailed { code: 1, .. }));
        // files were copied, but nothing after the venv step ran
        assert!(root.path().join("opt/device_monitor/udp_server.py").exists());
        assert!(!root.path().join("etc/systemd/system/device_monitor.service").exists());
        assert!(!host.commands().iter().any(|c| c.starts_with("systemctl")));
    }

    #[test]
    fn test_missing_source_file_aborts() {
        let root = tempdir().unwrap();
        let src = source_tree();
        fs::remove_file(src.path().join("udp_server.py")).unwrap();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new();

        let err = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingSource { ref entry, .. } if entry == "udp_server.py"));
    }

    #[test]
    fn test_enable_now() {
        let root = tempdir().unwrap();
        let src = source_tree();
        let layout = Layout::new(root.path());
        let svc = monitor();
        let host = RecordingHost::new();

        let mut installer = Installer::new(&host, &layout, &svc, src.path())
            .unwrap()
            .enable_now(true);
        installer.run_step(Step::Activate).unwrap();
        assert_eq!(
            host.commands(),
            vec!["systemctl daemon-reload", "systemctl enable --now device_monitor"]
        );
    }
}
