//! `lnsctl install` — put a service on the host.

use anyhow::Result;
use std::path::{Path, PathBuf};
use svc_deploy::{Host, Installer, Layout, RecordingHost, ServiceDef, Step, StepOutcome, SystemHost};

use crate::color;
use crate::config::DeployConfig;
use crate::progress;

pub fn run(config: &DeployConfig, service: &str, source: &Path, now: bool, root: Option<PathBuf>) -> Result<()> {
    let svc = config.service(service)?;

    match root {
        Some(root) => {
            let host = RecordingHost::new();
            let layout = Layout::new(root);
            install(&host, &layout, svc, source, &config.python, now)?;
            println!();
            println!("{}", color::bold("Commands a real install would run:"));
            for cmd in host.commands() {
                println!("  {}", cmd);
            }
        }
        None => install(&SystemHost, &Layout::system(), svc, source, &config.python, now)?,
    }
    Ok(())
}

fn install<H: Host>(
    host: &H,
    layout: &Layout,
    svc: &ServiceDef,
    source: &Path,
    python: &str,
    now: bool,
) -> Result<()> {
    let mut installer = Installer::new(host, layout, svc, source)?
        .python(python)
        .enable_now(now)
        .version(env!("CARGO_PKG_VERSION"));
    let paths = installer.paths().clone();

    println!(
        "Installing {} from {}{}",
        color::bold(&svc.name),
        source.display(),
        if layout.is_system() {
            String::new()
        } else {
            format!(" (staged under {})", layout.root().display())
        }
    );

    for step in Step::ALL {
        progress::step(step.label(), || installer.run_step(step), |outcome| match outcome {
            StepOutcome::Done => None,
            StepOutcome::Skipped(reason) => Some(reason.clone()),
        })?;
    }

    println!();
    println!("{}", color::bold_green(&format!("✓ {} installed.", svc.name)));
    println!();
    println!("  config    {}", paths.config.display());
    println!("  logs      {}", paths.log_dir.display());
    println!();
    let name = svc.aliases.first().unwrap_or(&svc.name);
    if !now {
        println!("  lnsctl ctl {} start   — start the service", name);
    }
    println!("  lnsctl ctl {} test    — run once in the foreground", name);
    println!("  lnsctl ctl {} logs    — follow the journal", name);
    Ok(())
}
