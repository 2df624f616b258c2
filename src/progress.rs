//! Step-by-step progress lines: `  Copying application files... done`.

use anyhow::Result;
use std::io::{self, Write};

use crate::color;

fn begin(label: &str) {
    print!("  {}...", label);
    io::stdout().flush().ok();
}

/// Run one step and report it. An error is reported as `failed` and handed
/// back so the caller stops; `skipped` turns a successful result into a
/// `skipped (reason)` line.
pub fn step<T, E>(
    label: &str,
    f: impl FnOnce() -> Result<T, E>,
    skipped: impl FnOnce(&T) -> Option<String>,
) -> Result<T, E> {
    begin(label);
    match f() {
        Ok(v) => {
            match skipped(&v) {
                Some(reason) => println!(" {} ({})", color::yellow("skipped"), reason),
                None => println!(" {}", color::green("done")),
            }
            Ok(v)
        }
        Err(e) => {
            println!(" {}", color::red("failed"));
            Err(e)
        }
    }
}

/// Run one step and keep going whatever happens.
pub fn best_effort(label: &str, f: impl FnOnce() -> Result<()>) {
    begin(label);
    match f() {
        Ok(()) => println!(" {}", color::green("done")),
        Err(e) => println!(" {} ({})", color::yellow("skipped"), e),
    }
}
