//! Endpoint credential lookup: process environment first, then `.env`.
//!
//! The `.env` file is read into a map; the process environment is never
//! modified.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DOTENV_FILE: &str = ".env";

/// Find the API key for the model endpoint, looking in `dir` for `.env`.
pub fn api_key(dir: &Path) -> Option<String> {
    resolve(std::env::var(API_KEY_VAR).ok(), &dir.join(DOTENV_FILE))
}

fn resolve(from_env: Option<String>, dotenv: &Path) -> Option<String> {
    if let Some(key) = from_env.filter(|k| !k.is_empty()) {
        debug!(var = API_KEY_VAR, "credential from environment");
        return Some(key);
    }

    let values = match read_dotenv(dotenv) {
        Ok(values) => values,
        Err(e) => {
            warn!(path = %dotenv.display(), error = %e, "could not read .env file");
            return None;
        }
    };
    let key = values.get(API_KEY_VAR).filter(|k| !k.is_empty()).cloned();
    if key.is_some() {
        debug!(var = API_KEY_VAR, path = %dotenv.display(), "credential from .env");
    }
    key
}

/// Read a `.env` file. A missing file is empty.
pub fn read_dotenv(path: &Path) -> io::Result<HashMap<String, String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_dotenv(&contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e),
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed, and matching quotes around the value are
/// removed. Later entries win.
pub fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    values
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
