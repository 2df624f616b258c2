//! CLI definitions for lnsctl.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    name = "lnsctl",
    version,
    about = "Install and manage the LNS device monitor and Telegram bot services\n\nInstalls each service under /opt/<name> with its own Python virtualenv, writes the systemd unit and logrotate policy, and wraps systemctl/journalctl.",
    long_about = None
)]
pub struct Cli {
    /// Path to lnsctl.toml (built-in services are used when it is missing)
    #[clap(long, short, default_value = "lnsctl.toml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a service from a source tree (requires root)
    Install {
        /// Service name or alias (monitor, bot)
        service: String,

        /// Project source tree holding the application files
        #[clap(long, default_value = ".")]
        source: PathBuf,

        /// Start the service right after enabling it
        #[clap(long)]
        now: bool,

        /// Stage files under this directory instead of /; system commands
        /// are printed, not run
        #[clap(long)]
        root: Option<PathBuf>,
    },

    /// Control an installed service: start|stop|restart|status|logs|enable|disable|test
    Ctl {
        /// Service name or alias
        service: String,

        /// Action to perform
        verb: Option<String>,
    },

    /// Stop, disable and remove an installed service (requires root)
    Uninstall {
        /// Service name or alias
        service: String,

        /// Also remove the config and log directories
        #[clap(long)]
        purge: bool,

        /// Do not ask for confirmation
        #[clap(long, short)]
        yes: bool,
    },

    /// Show install paths, manifest and unit state
    Info {
        /// Limit to one service (default: all)
        service: Option<String>,
    },

    /// Print a generated file without installing anything
    Render {
        /// Service name or alias
        service: String,

        #[clap(value_enum)]
        artifact: Artifact,
    },

    /// Search a service's log files for a word (case-insensitive)
    Grep {
        /// Word to look for; `error` matches only readings with an error set
        word: String,

        #[clap(long, short, default_value = "monitor")]
        service: String,
    },

    /// Print an example lnsctl.toml to stdout
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Artifact {
    /// systemd unit file
    Unit,
    /// logrotate policy
    Logrotate,
    /// initial service config
    Config,
}
