//! Styling for lnsctl's step lines, info tables and grep hits.
//!
//! Output is plain text whenever `NO_COLOR` is set or stdout is redirected.

use std::io::IsTerminal;
use std::sync::OnceLock;

static ENABLED: OnceLock<bool> = OnceLock::new();

pub fn enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    })
}

const BOLD: &str = "1";
const DIM: &str = "2";
const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const CYAN: &str = "36";

fn paint(sgr: &str, text: &str) -> String {
    if !enabled() {
        return text.to_string();
    }
    format!("\x1b[{sgr}m{text}\x1b[0m")
}

pub fn bold(s: &str) -> String { paint(BOLD, s) }
pub fn dim(s: &str) -> String { paint(DIM, s) }
pub fn red(s: &str) -> String { paint(RED, s) }
pub fn green(s: &str) -> String { paint(GREEN, s) }
pub fn yellow(s: &str) -> String { paint(YELLOW, s) }
pub fn cyan(s: &str) -> String { paint(CYAN, s) }
pub fn bold_green(s: &str) -> String { paint(&format!("{BOLD};{GREEN}"), s) }

/// Presence mark for the info table.
pub fn mark(ok: bool) -> String {
    if ok { green("✓") } else { red("✗") }
}
