//! `lnsctl info` — what is installed where, and whether it is running.

use anyhow::Result;
use std::path::PathBuf;
use svc_deploy::{Host, InstallManifest, Invocation, Layout, ServiceDef};

use crate::color;
use crate::config::DeployConfig;

pub fn run(config: &DeployConfig, service: Option<&str>, host: &impl Host) -> Result<()> {
    let selected: Vec<&ServiceDef> = match service {
        Some(name) => vec![config.service(name)?],
        None => config.services.iter().collect(),
    };

    let layout = Layout::system();
    for (i, svc) in selected.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_service(host, &layout, svc)?;
    }
    Ok(())
}

fn print_service(host: &impl Host, layout: &Layout, svc: &ServiceDef) -> Result<()> {
    let paths = layout.paths(svc);
    let width = 72;

    let aliases = if svc.aliases.is_empty() {
        String::new()
    } else {
        format!(" ({})", svc.aliases.join(", "))
    };
    println!("{}", color::bold(&"=".repeat(width)));
    println!("{}{}  {}", color::cyan(&svc.name), aliases, color::dim(&svc.description));
    println!("{}", color::bold(&"=".repeat(width)));

    for row in rows(layout, svc) {
        println!("  {}  {:<12}  {}", color::mark(row.present), row.label, row.path.display());
    }
    println!("{}", color::dim(&"-".repeat(width)));

    match InstallManifest::load(&layout.stage(&paths.manifest)) {
        Ok(m) => println!(
            "  Installed: {}   lnsctl v{}   {} file(s) from {}",
            m.installed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            m.version,
            m.files.len(),
            m.source.display()
        ),
        Err(_) => println!("  Installed: {}", color::dim("no manifest")),
    }

    let state = match unit_state(host, svc) {
        UnitState::Active => color::green("active"),
        UnitState::Inactive => color::yellow("inactive"),
        UnitState::Unknown => color::dim("unknown (systemctl not available)"),
    };
    println!("  Unit:      {}", state);
    Ok(())
}

/// One line of the path table. `path` is the real path; `present` is
/// checked under the layout's root.
#[derive(Debug, PartialEq, Eq)]
struct Row {
    label: &'static str,
    path: PathBuf,
    present: bool,
}

fn rows(layout: &Layout, svc: &ServiceDef) -> Vec<Row> {
    let paths = layout.paths(svc);
    [
        ("install dir", paths.install_dir),
        ("python", paths.python),
        ("config", paths.config),
        ("log dir", paths.log_dir),
        ("unit", paths.unit),
        ("logrotate", paths.logrotate),
        ("manifest", paths.manifest),
    ]
    .into_iter()
    .map(|(label, path)| Row { label, present: layout.stage(&path).exists(), path })
    .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum UnitState {
    Active,
    Inactive,
    Unknown,
}

fn unit_state(host: &impl Host, svc: &ServiceDef) -> UnitState {
    let cmd = Invocation::new("systemctl").args(["is-active", "--quiet", svc.name.as_str()]);
    match host.run_quiet(&cmd) {
        Ok(0) => UnitState::Active,
        Ok(_) => UnitState::Inactive,
        Err(_) => UnitState::Unknown,
    }
}
