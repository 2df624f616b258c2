//! `lnsctl ctl` — systemd/journalctl control for an installed service.

use anyhow::Result;
use svc_deploy::{dispatch, usage, Host, Layout, ServiceDef, Verb};

use crate::config::DeployConfig;

/// Dispatch `verb` and return the exit code the process should end with.
///
/// A missing or unknown verb prints usage and yields 1 without running
/// anything; otherwise the delegated command's exit code is returned as is.
pub fn control(config: &DeployConfig, service: &str, verb: Option<&str>, host: &impl Host) -> Result<i32> {
    let svc = config.service(service)?;
    let verb = match verb.map(str::parse::<Verb>) {
        Some(Ok(verb)) => verb,
        Some(Err(e)) => {
            eprintln!("{}", e);
            eprintln!("{}", usage_for(svc));
            return Ok(1);
        }
        None => {
            eprintln!("{}", usage_for(svc));
            return Ok(1);
        }
    };
    Ok(dispatch(host, &Layout::system(), svc, verb)?)
}

fn usage_for(svc: &ServiceDef) -> String {
    let name = svc.aliases.first().unwrap_or(&svc.name);
    usage(&format!("lnsctl ctl {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use svc_deploy::RecordingHost;

    #[test]
    fn test_unknown_verb_exits_1_without_running() {
        let config = DeployConfig::default_example();
        let host = RecordingHost::new();
        assert_eq!(control(&config, "monitor", Some("reload"), &host).unwrap(), 1);
        assert_eq!(control(&config, "monitor", None, &host).unwrap(), 1);
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn test_exit_code_of_delegated_command() {
        let config = DeployConfig::default_example();
        let host = RecordingHost::new().with_exit("systemctl", 3);
        assert_eq!(control(&config, "monitor", Some("status"), &host).unwrap(), 3);
        assert_eq!(host.commands(), vec!["systemctl status device_monitor"]);
    }

    #[test]
    fn test_unknown_service_is_an_error() {
        let config = DeployConfig::default_example();
        let host = RecordingHost::new();
        assert!(control(&config, "printer", Some("start"), &host).is_err());
    }
}
