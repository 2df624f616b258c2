//! lnsctl — install and manage the LNS device monitor and Telegram bot.
//!
//! Each service gets /opt/<name> with a private virtualenv, /etc/<name>,
//! /var/log/<name>, a systemd unit and a logrotate policy. Run
//! `lnsctl --help` for usage.

use anyhow::Result;
use clap::Parser;
use svc_deploy::{Layout, SystemHost, UnitFile};
use tracing_subscriber::EnvFilter;

mod cli;
mod color;
mod config;
mod grep;
mod info;
mod install;
mod progress;
mod service;
mod uninstall;

use cli::{Artifact, Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // `init` prints the built-ins and must work even with a broken config
    let config = match &cli.command {
        Commands::Init => config::DeployConfig::default_example(),
        _ => config::DeployConfig::load(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Install { service, source, now, root } => {
            install::run(&config, &service, &source, now, root)?;
        }
        Commands::Ctl { service, verb } => {
            let code = service::control(&config, &service, verb.as_deref(), &SystemHost)?;
            std::process::exit(code);
        }
        Commands::Uninstall { service, purge, yes } => {
            uninstall::run(&config, &service, purge, yes)?;
        }
        Commands::Info { service } => {
            info::run(&config, service.as_deref(), &SystemHost)?;
        }
        Commands::Render { service, artifact } => {
            let svc = config.service(&service)?;
            let paths = Layout::system().paths(svc);
            let text = match artifact {
                Artifact::Unit => UnitFile::for_service(svc, &paths).render(),
                Artifact::Logrotate => svc.logrotate.render(&paths.log_dir, svc.user(), svc.group()),
                Artifact::Config => svc.config.default_contents.clone(),
            };
            print!("{}", text);
        }
        Commands::Grep { word, service } => {
            grep::run(&config, &word, &service)?;
        }
    }

    Ok(())
}
