//! Case-insensitive search over a service's log files.
//!
//! Plain text logs match line by line. Files holding a JSON array of
//! readings (the monitor's `device_data.json`) match field by field, and the
//! word `error` only matches entries whose `error` field is actually set.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// One hit, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMatch {
    Line { file: PathBuf, line: usize, text: String },
    Field { file: PathBuf, entry: usize, field: String, value: String },
    Error { file: PathBuf, entry: usize, error: String, record: String },
}

/// Outcome of searching one file.
#[derive(Debug, Default)]
pub struct FileSearch {
    pub matches: Vec<LogMatch>,
    /// The file does not exist.
    pub missing: bool,
    /// The file exists but could not be read.
    pub error: Option<String>,
}

/// Search every file in `files`, in order.
pub fn search(files: &[PathBuf], word: &str) -> Vec<(PathBuf, FileSearch)> {
    let word = word.to_lowercase();
    files
        .iter()
        .map(|path| (path.clone(), search_file(path, &word)))
        .collect()
}

fn search_file(path: &Path, word: &str) -> FileSearch {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return FileSearch { missing: true, ..FileSearch::default() }
        }
        Err(e) => return FileSearch { error: Some(e.to_string()), ..FileSearch::default() },
    };
    // invalid UTF-8 is replaced, not fatal
    let content = String::from_utf8_lossy(&bytes);

    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let matches = if is_json {
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => search_entries(path, &entries, word),
            // a torn or non-array file is searched as text
            _ => search_lines(path, &content, word),
        }
    } else {
        search_lines(path, &content, word)
    };
    FileSearch { matches, ..FileSearch::default() }
}

fn search_lines(path: &Path, content: &str, word: &str) -> Vec<LogMatch> {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| l.to_lowercase().contains(word))
        .map(|(i, l)| LogMatch::Line {
            file: path.to_path_buf(),
            line: i + 1,
            text: l.trim().to_string(),
        })
        .collect()
}

fn search_entries(path: &Path, entries: &[Value], word: &str) -> Vec<LogMatch> {
    let mut out = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else { continue };

        if word == "error" {
            if let Some(error) = fields.get("error").and_then(error_text) {
                out.push(LogMatch::Error {
                    file: path.to_path_buf(),
                    entry: idx + 1,
                    error,
                    record: entry.to_string(),
                });
            }
            continue;
        }

        for (key, value) in fields {
            let text = display_value(value);
            if !text.is_empty() && text.to_lowercase().contains(word) {
                out.push(LogMatch::Field {
                    file: path.to_path_buf(),
                    entry: idx + 1,
                    field: key.clone(),
                    value: text,
                });
            }
        }
    }
    out
}

fn error_text(value: &Value) -> Option<String> {
    let text = display_value(value);
    let lower = text.to_lowercase();
    (!text.is_empty() && lower != "null" && lower != "none").then_some(text)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
