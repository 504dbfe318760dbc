//! Configuration loading from mcp-client.toml.

use mcp::{Runtimes, SessionOptions};
use runtime::OpenAiBackend;
use runtime::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mcp-client.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Model endpoint.
    pub model: ModelConfig,

    /// Interpreters for tool host scripts.
    pub runtimes: RuntimesConfig,

    /// Tool host timeouts.
    pub session: SessionConfig,
}

/// Model endpoint configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
        }
    }
}

/// Interpreter overrides. Unset entries use the platform defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimesConfig {
    pub python: Option<PathBuf>,
    pub node: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: mcp::DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
            request_timeout_secs: mcp::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            shutdown_grace_secs: mcp::DEFAULT_SHUTDOWN_GRACE.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `explicit` if given (it must exist), else the default file in
    /// `dir` if present, else defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let default_path = dir.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn runtimes(&self) -> Runtimes {
        let defaults = Runtimes::default();
        Runtimes {
            python: self.runtimes.python.clone().unwrap_or(defaults.python),
            node: self.runtimes.node.clone().unwrap_or(defaults.node),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handshake_timeout: Duration::from_secs(self.session.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.session.request_timeout_secs),
            shutdown_grace: Duration::from_secs(self.session.shutdown_grace_secs),
        }
    }

    /// Build the endpoint client. `model` overrides `model.name`.
    pub fn backend(&self, api_key: String, model: Option<&str>) -> OpenAiBackend {
        let model = model.unwrap_or(self.model.name.as_str());
        let builder = OpenAiBackend::builder(api_key, model).base_url(&self.model.base_url);
        match self.model.max_tokens {
            Some(max) => builder.max_tokens(max).build(),
            None => builder.build(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model.max_tokens, None);
        assert_eq!(config.session_options(), SessionOptions::default());
        assert_eq!(config.runtimes(), Runtimes::default());
    }

    #[test]
    fn full_file_is_applied() {
        let config = Config::parse(
            r#"
            [model]
            name = "gpt-4o-mini"
            base_url = "http://localhost:8080/v1"
            max_tokens = 1024

            [runtimes]
            python = "/opt/python/bin/python3.12"

            [session]
            handshake_timeout_secs = 5
            request_timeout_secs = 90
            shutdown_grace_secs = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.max_tokens, Some(1024));

        let runtimes = config.runtimes();
        assert_eq!(runtimes.python, PathBuf::from("/opt/python/bin/python3.12"));
        assert_eq!(runtimes.node, Runtimes::default().node);

        let options = config.session_options();
        assert_eq!(options.handshake_timeout, Duration::from_secs(5));
        assert_eq!(options.request_timeout, Duration::from_secs(90));
        assert_eq!(options.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::parse("[session]\nrequest_timeout_secs = 10\n").unwrap();
        assert_eq!(config.session.request_timeout_secs, 10);
        assert_eq!(config.session.handshake_timeout_secs, 30);
        assert_eq!(config.session.shutdown_grace_secs, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[model]\nnmae = \"typo\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn model_override_wins() {
        let config = Config::default();
        assert_eq!(config.backend("k".into(), None).model(), "gpt-4o");
        assert_eq!(
            config.backend("k".into(), Some("gpt-4.1")).model(),
            "gpt-4.1"
        );
    }

    #[test]
    fn missing_default_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.model.name, "gpt-4o");
    }

    #[test]
    fn default_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        writeln!(file, "[model]\nname = \"from-file\"").unwrap();

        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.model.name, "from-file");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::discover(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn explicit_file_beats_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[model]\nname = \"default\"\n",
        )
        .unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[model]\nname = \"explicit\"\n").unwrap();

        let config = Config::discover(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config.model.name, "explicit");
    }
}
