//! systemd unit file generation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::layout::ServicePaths;
use crate::service::ServiceDef;

/// Resolved contents of `/etc/systemd/system/<name>.service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub description: String,
    pub user: String,
    pub group: String,
    pub supplementary_groups: Vec<String>,
    pub working_directory: PathBuf,
    pub environment: Vec<String>,
    pub exec_start: Vec<String>,
    pub restart: String,
    pub restart_sec: u64,
    pub read_write_paths: Vec<PathBuf>,
}

impl UnitFile {
    pub fn for_service(svc: &ServiceDef, paths: &ServicePaths) -> Self {
        let mut exec_start = vec![
            paths.python.display().to_string(),
            paths.entry.display().to_string(),
        ];
        if svc.pass_config {
            exec_start.push("--config".into());
            exec_start.push(paths.config.display().to_string());
        }

        Self {
            description: svc.description.clone(),
            user: svc.user().to_string(),
            group: svc.group().to_string(),
            supplementary_groups: svc.supplementary_groups.clone(),
            working_directory: paths.install_dir.clone(),
            environment: svc.environment.clone(),
            exec_start,
            restart: svc.restart.clone(),
            restart_sec: svc.restart_sec,
            read_write_paths: vec![paths.log_dir.clone(), paths.etc_dir.clone()],
        }
    }

    /// Program named by `ExecStart=`.
    pub fn program(&self) -> &Path {
        Path::new(self.exec_start.first().map(String::as_str).unwrap_or_default())
    }

    pub fn render(&self) -> String {
        let mut service = String::new();
        let _ = writeln!(service, "Type=simple");
        let _ = writeln!(service, "User={}", self.user);
        let _ = writeln!(service, "Group={}", self.group);
        if !self.supplementary_groups.is_empty() {
            let _ = writeln!(service, "SupplementaryGroups={}", self.supplementary_groups.join(" "));
        }
        let _ = writeln!(service, "WorkingDirectory={}", self.working_directory.display());
        for pair in &self.environment {
            let _ = writeln!(service, "Environment={}", pair);
        }
        let _ = writeln!(service, "ExecStart={}", self.exec_start.join(" "));
        let _ = writeln!(service, "Restart={}", self.restart);
        let _ = writeln!(service, "RestartSec={}", self.restart_sec);
        let rw: Vec<String> = self
            .read_write_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        format!(
            r#"[Unit]
Description={description}
After=network-online.target
Wants=network-online.target

[Service]
{service}StandardOutput=journal
StandardError=journal
NoNewPrivileges=true
PrivateTmp=true
ProtectSystem=strict
ProtectHome=true
ReadWritePaths={rw}

[Install]
WantedBy=multi-user.target
"#,
            description = self.description,
            service = service,
            rw = rw.join(" "),
        )
    }
}

/// Program path from the first `ExecStart=` line of a unit file. Prefixes
/// such as `-` or `@` are stripped.
pub fn exec_start_program(unit_text: &str) -> Option<PathBuf> {
    unit_text
        .lines()
        .filter_map(|l| l.trim().strip_prefix("ExecStart="))
        .next()
        .and_then(|cmd| cmd.split_whitespace().next())
        .map(|p| p.trim_start_matches(['-', '@', '+', '!', ':']))
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::service::builtin_services;

    #[test]
    fn test_monitor_unit() {
        let svc = &builtin_services()[0];
        let unit = UnitFile::for_service(svc, &Layout::system().paths(svc));
        let text = unit.render();
        assert!(text.contains("Description=LNS device monitor\n"));
        assert!(text.contains(
            "ExecStart=/opt/device_monitor/venv/bin/python /opt/device_monitor/scripts/device_monitor.py --config /etc/device_monitor/config.yaml\n"
        ));
        assert!(text.contains("User=device_monitor\nGroup=device_monitor\nSupplementaryGroups=dialout\n"));
        assert!(text.contains("Restart=always\nRestartSec=5\n"));
        assert!(text.contains("ProtectSystem=strict\n"));
        assert!(text.contains("ReadWritePaths=/var/log/device_monitor /etc/device_monitor\n"));
        assert!(text.ends_with("[Install]\nWantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_bot_unit_has_no_config_flag() {
        let svc = &builtin_services()[1];
        let unit = UnitFile::for_service(svc, &Layout::system().paths(svc));
        let text = unit.render();
        assert!(text.contains(
            "ExecStart=/opt/lns_project_bot/venv/bin/python /opt/lns_project_bot/telegram_bot/bot.py\n"
        ));
        assert!(text.contains("Environment=PYTHONPATH=/opt/lns_project_bot\n"));
        assert!(!text.contains("SupplementaryGroups"));
    }

    #[test]
    fn test_exec_start_program_roundtrip() {
        let svc = &builtin_services()[0];
        let unit = UnitFile::for_service(svc, &Layout::system().paths(svc));
        assert_eq!(exec_start_program(&unit.render()).as_deref(), Some(unit.program()));
        assert_eq!(
            exec_start_program("[Service]\nExecStart=-/usr/bin/true --flag\n"),
            Some(PathBuf::from("/usr/bin/true"))
        );
        assert_eq!(exec_start_program("[Service]\nType=simple\n"), None);
    }
}
