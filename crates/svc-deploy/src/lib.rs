pub mod control;
pub mod copy;
pub mod error;
pub mod host;
pub mod install;
pub mod layout;
pub mod logrotate;
pub mod logsearch;
pub mod manifest;
pub mod service;
pub mod unit;

pub use control::{dispatch, usage, Verb};
pub use error::{DeployError, Result};
pub use host::{Host, Invocation, RecordingHost, SystemHost};
pub use install::{InstallReport, Installer, Step, StepOutcome};
pub use layout::{Layout, ServicePaths};
pub use logrotate::LogrotatePolicy;
pub use logsearch::{search, FileSearch, LogMatch};
pub use manifest::InstallManifest;
pub use service::{builtin_services, find_service, ConfigFile, ConfigLocation, ServiceDef};
pub use unit::UnitFile;
