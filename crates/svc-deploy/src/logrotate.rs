//! logrotate policy for a service's log directory.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogrotatePolicy {
    /// `daily`, `weekly` or `monthly`.
    #[serde(default = "LogrotatePolicy::default_schedule")]
    pub schedule: String,
    /// Rotated generations to keep.
    #[serde(default = "LogrotatePolicy::default_rotate")]
    pub rotate: u32,
    #[serde(default = "LogrotatePolicy::default_compress")]
    pub compress: bool,
    /// Truncate in place instead of moving the file, for writers that keep
    /// the log open (Python `FileHandler`).
    #[serde(default = "LogrotatePolicy::default_copytruncate")]
    pub copytruncate: bool,
    /// Glob inside the log dir.
    #[serde(default = "LogrotatePolicy::default_pattern")]
    pub pattern: String,
}

impl LogrotatePolicy {
    fn default_schedule() -> String { "daily".into() }
    fn default_rotate() -> u32 { 30 }
    fn default_compress() -> bool { true }
    fn default_copytruncate() -> bool { true }
    fn default_pattern() -> String { "*.log".into() }

    pub fn render(&self, log_dir: &Path, user: &str, group: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}/{} {{", log_dir.display(), self.pattern);
        let _ = writeln!(out, "    {}", self.schedule);
        let _ = writeln!(out, "    rotate {}", self.rotate);
        if self.compress {
            out.push_str("    compress\n");
            out.push_str("    delaycompress\n");
        }
        out.push_str("    missingok\n");
        out.push_str("    notifempty\n");
        if self.copytruncate {
            out.push_str("    copytruncate\n");
        } else {
            let _ = writeln!(out, "    create 0640 {} {}", user, group);
        }
        let _ = writeln!(out, "    su {} {}", user, group);
        out.push_str("}\n");
        out
    }
}

impl Default for LogrotatePolicy {
    fn default() -> Self {
        Self {
            schedule: Self::default_schedule(),
            rotate: Self::default_rotate(),
            compress: Self::default_compress(),
            copytruncate: Self::default_copytruncate(),
            pattern: Self::default_pattern(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let text = LogrotatePolicy::default().render(
            Path::new("/var/log/device_monitor"),
            "device_monitor",
            "device_monitor",
        );
        assert_eq!(
            text,
            "/var/log/device_monitor/*.log {\n    daily\n    rotate 30\n    compress\n    delaycompress\n    missingok\n    notifempty\n    copytruncate\n    su device_monitor device_monitor\n}\n"
        );
    }

    #[test]
    fn test_uncompressed_weekly() {
        let policy = LogrotatePolicy {
            schedule: "weekly".into(),
            rotate: 4,
            compress: false,
            copytruncate: false,
            ..LogrotatePolicy::default()
        };
        let text = policy.render(Path::new("/var/log/x"), "x", "adm");
        assert!(text.contains("    weekly\n    rotate 4\n"));
        assert!(!text.contains("compress"));
        assert!(text.contains("create 0640 x adm"));
    }
}
