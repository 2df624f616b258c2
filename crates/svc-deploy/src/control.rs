//! Control dispatcher: one verb, one external command.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{DeployError, Result};
use crate::host::{Host, Invocation};
use crate::layout::Layout;
use crate::service::ServiceDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Status,
    Logs,
    Enable,
    Disable,
    /// Run the program in the foreground, bypassing systemd.
    Test,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Status,
        Verb::Logs,
        Verb::Enable,
        Verb::Disable,
        Verb::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Status => "status",
            Verb::Logs => "logs",
            Verb::Enable => "enable",
            Verb::Disable => "disable",
            Verb::Test => "test",
        }
    }

    pub fn invocation(self, svc: &ServiceDef, layout: &Layout) -> Invocation {
        match self {
            Verb::Logs => Invocation::new("journalctl").args(["-u", svc.name.as_str(), "-f"]),
            Verb::Test => {
                // same environment and working directory the unit gives it
                let paths = layout.paths(svc);
                let cmd = Invocation::new(layout.stage(&paths.python).display().to_string())
                    .arg(layout.stage(&paths.entry).display().to_string())
                    .args(["--test", "--config"])
                    .arg(layout.stage(&paths.config).display().to_string())
                    .current_dir(layout.stage(&paths.install_dir));
                svc.environment.iter().fold(cmd, |cmd, entry| match entry.split_once('=') {
                    Some((key, value)) => cmd.env(key, value),
                    None => cmd,
                })
            }
            _ => Invocation::new("systemctl").args([self.as_str(), svc.name.as_str()]),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DeployError::UnknownVerb(s.to_string()))
    }
}

/// `Usage: <program> {start|stop|...}`
pub fn usage(program: &str) -> String {
    let verbs: Vec<&str> = Verb::ALL.iter().map(|v| v.as_str()).collect();
    format!("Usage: {} {{{}}}", program, verbs.join("|"))
}

/// Run the command for `verb` and return its exit code unchanged.
pub fn dispatch<H: Host>(host: &H, layout: &Layout, svc: &ServiceDef, verb: Verb) -> Result<i32> {
    let cmd = verb.invocation(svc, layout);
    debug!(service = %svc.name, verb = %verb, command = %cmd, "dispatch");
    host.run(&cmd)
}
