//! `lnsctl grep` — look for a word in a service's logs.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use svc_deploy::{search, Layout, LogMatch};

use crate::color;
use crate::config::DeployConfig;

pub fn run(config: &DeployConfig, word: &str, service: &str) -> Result<()> {
    let svc = config.service(service)?;
    let log_dir = Layout::system().paths(svc).log_dir;
    if svc.log_files.is_empty() {
        println!("{} has no log files configured (it logs to the journal).", svc.name);
        println!("Try:  lnsctl ctl {} logs", svc.aliases.first().unwrap_or(&svc.name));
        return Ok(());
    }

    let files: Vec<PathBuf> = svc.log_files.iter().map(|f| log_dir.join(f)).collect();
    println!("Searching '{}' in {}...", word.to_lowercase(), log_dir.display());
    println!("{}", color::dim(&"-".repeat(60)));
    let tally = print_matches(&files, word);
    if tally.found == 0 && tally.unreadable == 0 {
        println!("No matches found.");
    }
    println!("{}", color::dim(&"-".repeat(60)));
    if tally.unreadable > 0 {
        bail!("{} log file(s) could not be read", tally.unreadable);
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    found: usize,
    unreadable: usize,
}

/// Print every match and read error.
fn print_matches(files: &[PathBuf], word: &str) -> Tally {
    let mut tally = Tally::default();
    for (file, result) in search(files, word) {
        if result.missing {
            println!("{}", color::dim(&format!("{} not found", file.display())));
            continue;
        }
        if let Some(error) = &result.error {
            println!("{} {}: {}", color::red("cannot read"), file.display(), error);
            tally.unreadable += 1;
            continue;
        }
        for m in &result.matches {
            println!("{}", format_match(m));
        }
        tally.found += result.matches.len();
    }
    tally
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_match(m: &LogMatch) -> String {
    match m {
        LogMatch::Line { file, line, text } => format!("{}:{}: {}", file_name(file), line, text),
        LogMatch::Field { file, entry, field, value } => {
            format!("{}: entry #{}, field '{}': {}", file_name(file), entry, field, value)
        }
        LogMatch::Error { file, entry, error, record } => format!(
            "{}: entry #{}: {} {}\n    {}",
            file_name(file),
            entry,
            color::red("ERROR:"),
            error,
            color::dim(record)
        ),
    }
}
