//! `lnsctl uninstall` — remove an installed service from the system.

use anyhow::Result;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use svc_deploy::{DeployError, Host, Invocation, Layout, ServiceDef, SystemHost};

use crate::color;
use crate::config::DeployConfig;
use crate::progress::best_effort;

pub fn run(config: &DeployConfig, service: &str, purge: bool, yes: bool) -> Result<()> {
    let svc = config.service(service)?;
    let host = SystemHost;
    if !host.is_privileged() {
        return Err(DeployError::NotPrivileged(format!("uninstall {}", svc.name)).into());
    }
    let layout = Layout::system();

    println!("The following will be removed:");
    for (label, path) in targets(&layout, svc, purge) {
        println!("  {:<22}  {}", label, path.display());
    }
    if !purge {
        println!();
        println!("{}", color::dim("Config and logs are kept; pass --purge to remove them too."));
    }
    println!();

    if !yes {
        print!("{}", color::yellow("Proceed? [y/N]: "));
        io::stdout().flush().ok();

        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
        println!();
    }

    remove(&host, &layout, svc, purge);

    println!();
    println!("{}", color::bold_green(&format!("✓ {} uninstalled.", svc.name)));
    Ok(())
}

fn targets(layout: &Layout, svc: &ServiceDef, purge: bool) -> Vec<(&'static str, PathBuf)> {
    let paths = layout.paths(svc);
    let mut out = vec![
        ("systemd unit", paths.unit),
        ("logrotate policy", paths.logrotate),
        ("install directory", paths.install_dir),
    ];
    if purge {
        out.push(("config directory", paths.etc_dir));
        out.push(("log directory", paths.log_dir));
    }
    out
}

/// Stop the unit and delete its files. A step that fails is reported and
/// skipped; the rest still run.
fn remove<H: Host>(host: &H, layout: &Layout, svc: &ServiceDef, purge: bool) {
    best_effort("Stopping service", || {
        host.run_quiet(&Invocation::new("systemctl").args(["stop", svc.name.as_str()]))?;
        host.run_quiet(&Invocation::new("systemctl").args(["disable", svc.name.as_str()]))?;
        Ok(())
    });

    let paths = layout.paths(svc);
    best_effort(&format!("Removing unit file ({})", paths.unit.display()), || {
        remove_path(&layout.stage(&paths.unit))?;
        host.check(&Invocation::new("systemctl").arg("daemon-reload"))?;
        Ok(())
    });

    for (label, path) in targets(layout, svc, purge).into_iter().skip(1) {
        best_effort(&format!("Removing {} ({})", label, path.display()), || {
            remove_path(&layout.stage(&path))
        });
    }
}

fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
