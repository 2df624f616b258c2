//! External command seam.
//!
//! Every `systemctl`, `journalctl`, `useradd`, `chown` and `pip` call goes
//! through a [`Host`]. [`SystemHost`] runs them for real; [`RecordingHost`]
//! records them, which is what `--root` staging and the tests use.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::error::{DeployError, Result};

/// A single external command.
///
/// `env` is added on top of the inherited environment; `cwd` defaults to
/// the caller's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), env: Vec::new(), cwd: None }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

pub trait Host {
    /// Whether the current process may modify system state.
    fn is_privileged(&self) -> bool;

    /// `true` when commands are only recorded, so their side effects
    /// (a created venv, a started unit) cannot be observed afterwards.
    fn dry_run(&self) -> bool {
        false
    }

    /// Run with inherited stdio and return the exit code.
    fn run(&self, cmd: &Invocation) -> Result<i32>;

    /// Run with stdout/stderr discarded and return the exit code.
    fn run_quiet(&self, cmd: &Invocation) -> Result<i32>;

    /// Run and fail unless the command exits 0.
    fn check(&self, cmd: &Invocation) -> Result<()> {
        match self.run(cmd)? {
            0 => Ok(()),
            code => Err(DeployError::CommandFailed { command: cmd.to_string(), code }),
        }
    }
}

/// Runs commands on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    fn spawn(cmd: &Invocation, quiet: bool) -> Result<i32> {
        debug!(command = %cmd, "exec");
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        command.envs(cmd.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        if quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = command.status().map_err(|source| DeployError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        Ok(exit_code(status))
    }
}

impl Host for SystemHost {
    fn is_privileged(&self) -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    fn run(&self, cmd: &Invocation) -> Result<i32> {
        Self::spawn(cmd, false)
    }

    fn run_quiet(&self, cmd: &Invocation) -> Result<i32> {
        Self::spawn(cmd, true)
    }
}

/// Shell convention: a process killed by signal N reports 128+N.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Records invocations instead of running them.
///
/// Every command succeeds unless an exit code was scripted for its program
/// with [`RecordingHost::with_exit`].
#[derive(Debug)]
pub struct RecordingHost {
    privileged: bool,
    dry_run: bool,
    exits: HashMap<String, i32>,
    log: RefCell<Vec<Invocation>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            privileged: true,
            dry_run: true,
            exits: HashMap::new(),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn unprivileged() -> Self {
        Self { privileged: false, ..Self::new() }
    }

    /// Treat recorded commands as if they had really run, so the installer
    /// verifies their outputs instead of skipping the check.
    pub fn live(mut self) -> Self {
        self.dry_run = false;
        self
    }

    pub fn with_exit(mut self, program: &str, code: i32) -> Self {
        self.exits.insert(program.to_string(), code);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.borrow().clone()
    }

    /// Recorded commands rendered one per line.
    pub fn commands(&self) -> Vec<String> {
        self.log.borrow().iter().map(ToString::to_string).collect()
    }

    fn record(&self, cmd: &Invocation) -> i32 {
        debug!(command = %cmd, "record");
        self.log.borrow_mut().push(cmd.clone());
        self.exits.get(&cmd.program).copied().unwrap_or(0)
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for RecordingHost {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn run(&self, cmd: &Invocation) -> Result<i32> {
        Ok(self.record(cmd))
    }

    fn run_quiet(&self, cmd: &Invocation) -> Result<i32> {
        Ok(self.record(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = Invocation::new("pip").args(["install", "pyserial>=3.5", "a b"]);
        assert_eq!(cmd.to_string(), "pip install pyserial>=3.5 'a b'");
    }

    #[test]
    fn test_environment_is_not_part_of_display() {
        let cmd = Invocation::new("python")
            .arg("bot.py")
            .env("PYTHONPATH", "/opt/bot")
            .current_dir("/opt/bot");
        assert_eq!(cmd.to_string(), "python bot.py");
        assert_eq!(cmd.env, vec![("PYTHONPATH".to_string(), "/opt/bot".to_string())]);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/opt/bot")));
    }

    #[test]
    fn test_check_reports_exit_code() {
        let host = RecordingHost::new().with_exit("systemctl", 5);
        let err = host
            .check(&Invocation::new("systemctl").arg("daemon-reload"))
            .unwrap_err();
        match err {
            DeployError::CommandFailed { command, code } => {
                assert_eq!(command, "systemctl daemon-reload");
                assert_eq!(code, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(host.commands(), vec!["systemctl daemon-reload"]);
    }

    #[test]
    fn test_exit_code_from_signal() {
        // raw wait status for "killed by SIGTERM"
        let status = ExitStatus::from_raw(libc::SIGTERM);
        assert_eq!(exit_code(status), 128 + libc::SIGTERM);
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code(status), 3);
    }
}
