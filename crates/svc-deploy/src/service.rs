//! Service definitions: what gets installed, and how it runs.

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::logrotate::LogrotatePolicy;

/// One managed service (device monitor, Telegram bot, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceDef {
    /// Unit name; also names the account and the /opt, /etc and /var/log dirs.
    pub name: String,
    /// Short names accepted on the command line.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub description: String,
    /// Service account. Defaults to `name`.
    #[serde(default)]
    pub user: Option<String>,
    /// Service group. Defaults to the user.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub supplementary_groups: Vec<String>,
    /// Paths relative to the source tree; directories are copied recursively.
    pub files: Vec<String>,
    /// Script inside the install dir run by `ExecStart`.
    pub entry: String,
    /// pip requirement specifiers.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Append `--config <path>` to `ExecStart`.
    #[serde(default = "ServiceDef::default_pass_config")]
    pub pass_config: bool,
    /// `KEY=VALUE` pairs for `Environment=`.
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default = "ServiceDef::default_restart")]
    pub restart: String,
    #[serde(default = "ServiceDef::default_restart_sec")]
    pub restart_sec: u64,
    /// File names inside the log dir, searched by `lnsctl grep`.
    #[serde(default)]
    pub log_files: Vec<String>,
    pub config: ConfigFile,
    #[serde(default)]
    pub logrotate: LogrotatePolicy,
}

/// Where the service config lives and what it starts out as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub location: ConfigLocation,
    pub file_name: String,
    /// Path inside the source tree copied verbatim when it exists.
    #[serde(default)]
    pub template: Option<String>,
    /// Written when no template is available.
    #[serde(default)]
    pub default_contents: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLocation {
    /// `/etc/<name>/<file_name>`
    #[default]
    Etc,
    /// `/opt/<name>/<file_name>`, for programs that import their config.
    Install,
}

impl ServiceDef {
    fn default_pass_config() -> bool { true }
    fn default_restart() -> String { "always".into() }
    fn default_restart_sec() -> u64 { 5 }

    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.name)
    }

    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or_else(|| self.user())
    }

    pub fn unit_name(&self) -> String {
        format!("{}.service", self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name
            || self.unit_name() == name
            || self.aliases.iter().any(|a| a == name)
    }

    /// Reject values that would produce a broken unit file or escape the
    /// install directories.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| DeployError::InvalidService {
            name: self.name.clone(),
            reason,
        };

        for (what, value) in [("name", self.name.as_str()), ("user", self.user()), ("group", self.group())] {
            if !is_account_name(value) {
                return Err(invalid(format!("{what} `{value}` must match [a-z_][a-z0-9_-]*")));
            }
        }
        for group in &self.supplementary_groups {
            if !is_account_name(group) {
                return Err(invalid(format!("supplementary group `{group}` must match [a-z_][a-z0-9_-]*")));
            }
        }
        let single_line = [
            ("description", self.description.as_str()),
            ("restart", self.restart.as_str()),
            ("logrotate schedule", self.logrotate.schedule.as_str()),
        ];
        for (what, value) in single_line {
            if value.contains(char::is_control) {
                return Err(invalid(format!("{what} must be a single line")));
            }
        }
        // both end up as one whitespace-separated token
        for (what, value) in [("entry", self.entry.as_str()), ("logrotate pattern", self.logrotate.pattern.as_str())] {
            if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c.is_control()) {
                return Err(invalid(format!("{what} `{value}` must not be empty or contain whitespace")));
            }
        }
        if self.files.is_empty() {
            return Err(invalid("no files to install".into()));
        }
        let relative = self
            .files
            .iter()
            .chain(std::iter::once(&self.entry))
            .chain(std::iter::once(&self.config.file_name))
            .chain(self.config.template.iter())
            .chain(self.log_files.iter());
        for path in relative {
            if !is_relative_path(path) {
                return Err(invalid(format!("path `{path}` must be relative and stay inside its directory")));
            }
        }
        for pair in &self.environment {
            if !pair.contains('=') || pair.contains('\n') {
                return Err(invalid(format!("environment entry `{pair}` must be KEY=VALUE")));
            }
        }
        Ok(())
    }
}

fn is_account_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 32 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn is_relative_path(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('/')
        && !s.contains('\n')
        && s.split('/').all(|part| part != "..")
}

/// Look a service up by name, unit name or alias.
pub fn find_service<'a>(services: &'a [ServiceDef], name: &str) -> Result<&'a ServiceDef> {
    services
        .iter()
        .find(|s| s.matches(name))
        .ok_or_else(|| DeployError::UnknownService {
            name: name.to_string(),
            known: services
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// The device monitor daemon and the Telegram bot.
pub fn builtin_services() -> Vec<ServiceDef> {
    vec![device_monitor(), telegram_bot()]
}

fn device_monitor() -> ServiceDef {
    ServiceDef {
        name: "device_monitor".into(),
        aliases: vec!["monitor".into()],
        description: "LNS device monitor".into(),
        user: None,
        group: None,
        // serial interface needs /dev/ttyACM*
        supplementary_groups: vec!["dialout".into()],
        files: vec![
            "scripts/device_monitor.py".into(),
            "device".into(),
            "udp_server.py".into(),
        ],
        entry: "scripts/device_monitor.py".into(),
        requirements: vec!["pyserial>=3.5".into(), "pyyaml>=6.0".into()],
        config: ConfigFile {
            location: ConfigLocation::Etc,
            file_name: "config.yaml".into(),
            template: Some("config/default.yaml".into()),
            default_contents: MONITOR_CONFIG.into(),
        },
        pass_config: true,
        environment: vec!["PYTHONUNBUFFERED=1".into()],
        restart: ServiceDef::default_restart(),
        restart_sec: ServiceDef::default_restart_sec(),
        log_files: vec!["device_monitor.log".into(), "device_data.json".into()],
        logrotate: LogrotatePolicy::default(),
    }
}

fn telegram_bot() -> ServiceDef {
    ServiceDef {
        name: "lns_project_bot".into(),
        aliases: vec!["bot".into()],
        description: "LNS device Telegram bot".into(),
        user: None,
        group: None,
        supplementary_groups: Vec::new(),
        files: vec!["telegram_bot".into()],
        entry: "telegram_bot/bot.py".into(),
        requirements: vec!["python-telegram-bot>=20.0".into(), "pyyaml>=6.0".into()],
        // bot.py does `from config import ...`
        config: ConfigFile {
            location: ConfigLocation::Install,
            file_name: "config.py".into(),
            template: Some("config.py".into()),
            default_contents: BOT_CONFIG.into(),
        },
        pass_config: false,
        environment: vec![
            "PYTHONUNBUFFERED=1".into(),
            "PYTHONPATH=/opt/lns_project_bot".into(),
        ],
        restart: ServiceDef::default_restart(),
        restart_sec: 10,
        log_files: Vec::new(),
        logrotate: LogrotatePolicy::default(),
    }
}

const MONITOR_CONFIG: &str = r#"device:
  interface: udp          # udp | serial
  host: 127.0.0.1
  port: 10000
  serial_port: ttyACM0
  baudrate: 115200
  timeout: 5.0

monitoring:
  period: 2.0
  log_file: /var/log/device_monitor/device_data.json
  max_log_size_mb: 10
  max_log_files: 5

logging:
  level: INFO
  file: /var/log/device_monitor/device_monitor.log
  format: '%(asctime)s - %(name)s - %(levelname)s - %(message)s'
"#;

const BOT_CONFIG: &str = r#"# Telegram bot settings. Edit BOT_TOKEN before starting the service.
BOT_TOKEN = "PUT_YOUR_BOT_TOKEN_HERE"
DEVICE_HOST = "127.0.0.1"
DEVICE_PORT = 10000
TIMEOUT = 5.0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        for svc in builtin_services() {
            svc.validate().unwrap();
        }
    }

    #[test]
    fn test_find_by_alias_and_unit_name() {
        let services = builtin_services();
        assert_eq!(find_service(&services, "monitor").unwrap().name, "device_monitor");
        assert_eq!(find_service(&services, "lns_project_bot.service").unwrap().name, "lns_project_bot");
        let err = find_service(&services, "nope").unwrap_err();
        assert!(err.to_string().contains("device_monitor, lns_project_bot"));
    }

    #[test]
    fn test_user_and_group_defaults() {
        let mut svc = device_monitor();
        assert_eq!(svc.user(), "device_monitor");
        assert_eq!(svc.group(), "device_monitor");
        svc.user = Some("lns".into());
        assert_eq!(svc.group(), "lns");
    }

    #[test]
    fn test_validate_rejects_escaping_paths() {
        let mut svc = device_monitor();
        svc.files.push("../etc/shadow".into());
        assert!(svc.validate().is_err());

        let mut svc = device_monitor();
        svc.entry = "/usr/bin/python3".into();
        assert!(svc.validate().is_err());

        let mut svc = device_monitor();
        svc.name = "Device Monitor".into();
        assert!(svc.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unit_breaking_values() {
        let cases: [fn(&mut ServiceDef); 6] = [
            |svc| svc.description = "Monitor\nExecStartPre=/bin/sh".into(),
            |svc| svc.restart = "always\nUser=root".into(),
            |svc| svc.supplementary_groups.push("dialout wheel".into()),
            |svc| svc.logrotate.schedule = "daily\n}".into(),
            |svc| svc.logrotate.pattern = "*.log /etc/passwd".into(),
            |svc| svc.entry = "scripts/device monitor.py".into(),
        ];
        for (i, break_it) in cases.into_iter().enumerate() {
            let mut svc = device_monitor();
            break_it(&mut svc);
            assert!(
                matches!(svc.validate(), Err(DeployError::InvalidService { .. })),
                "case {i} was accepted"
            );
        }
        assert!(device_monitor().validate().is_ok());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let svc: ServiceDef = toml::from_str(
            r#"
            name = "relay"
            description = "Relay"
            files = ["relay.py"]
            entry = "relay.py"

            [config]
            file_name = "relay.yaml"
            "#,
        )
        .unwrap();
        assert!(svc.pass_config);
        assert_eq!(svc.restart, "always");
        assert_eq!(svc.restart_sec, 5);
        assert_eq!(svc.config.location, ConfigLocation::Etc);
        assert_eq!(svc.logrotate, LogrotatePolicy::default());
    }
}
