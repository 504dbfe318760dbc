//! Tool host launch: script kind detection, interpreter selection and
//! process spawning.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Environment variables passed through to the tool host. Everything else is
/// cleared.
#[cfg(not(windows))]
pub const INHERITED_ENV_VARS: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

#[cfg(windows)]
pub const INHERITED_ENV_VARS: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// The kind of tool host script, decided by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Python,
    Node,
}

impl ScriptKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => Ok(Self::Python),
            Some("js") => Ok(Self::Node),
            _ => Err(Error::UnsupportedScriptKind {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Interpreter used for each script kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtimes {
    pub python: PathBuf,
    pub node: PathBuf,
}

impl Default for Runtimes {
    fn default() -> Self {
        let python = if cfg!(windows) { "python" } else { "python3" };
        Self {
            python: PathBuf::from(python),
            node: PathBuf::from("node"),
        }
    }
}

impl Runtimes {
    pub fn interpreter(&self, kind: ScriptKind) -> &Path {
        match kind {
            ScriptKind::Python => &self.python,
            ScriptKind::Node => &self.node,
        }
    }
}

/// A fully resolved command line for a tool host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub kind: ScriptKind,
    pub program: PathBuf,
    pub script: PathBuf,
}

impl LaunchCommand {
    /// Pick the interpreter for `script` and resolve its path.
    ///
    /// Python scripts are made absolute; node scripts are passed as given.
    /// Fails with [`Error::UnsupportedScriptKind`] for any other suffix.
    pub fn for_script(runtimes: &Runtimes, script: &Path) -> Result<Self> {
        let kind = ScriptKind::from_path(script)?;
        let script = match kind {
            ScriptKind::Python => std::path::absolute(script).map_err(|source| Error::Spawn {
                command: script.display().to_string(),
                source,
            })?,
            ScriptKind::Node => script.to_path_buf(),
        };

        Ok(Self {
            kind,
            program: runtimes.interpreter(kind).to_path_buf(),
            script,
        })
    }

    /// The restricted environment for the child.
    pub fn environment() -> Vec<(&'static str, OsString)> {
        INHERITED_ENV_VARS
            .iter()
            .filter_map(|key| std::env::var_os(key).map(|value| (*key, value)))
            .filter(|(_, value)| !value.to_string_lossy().starts_with("()"))
            .collect()
    }

    /// Build the tokio command with piped stdio.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.script)
            .env_clear()
            .envs(Self::environment())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program.display(), self.script.display())
    }
}

/// Starts tool host processes.
pub trait Launcher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> std::io::Result<Child>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, command: &LaunchCommand) -> std::io::Result<Child> {
        command.command().spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_scripts_use_python_with_absolute_path() {
        let runtimes = Runtimes {
            python: "/opt/py/bin/python".into(),
            node: "/usr/bin/node".into(),
        };
        let cmd = LaunchCommand::for_script(&runtimes, Path::new("servers/weather.py")).unwrap();

        assert_eq!(cmd.kind, ScriptKind::Python);
        assert_eq!(cmd.program, PathBuf::from("/opt/py/bin/python"));
        assert!(cmd.script.is_absolute());
        assert!(cmd.script.ends_with("servers/weather.py"));
    }

    #[test]
    fn node_scripts_use_node_with_path_as_given() {
        let runtimes = Runtimes::default();
        let cmd = LaunchCommand::for_script(&runtimes, Path::new("build/index.js")).unwrap();

        assert_eq!(cmd.kind, ScriptKind::Node);
        assert_eq!(cmd.program, PathBuf::from("node"));
        assert_eq!(cmd.script, PathBuf::from("build/index.js"));
    }

    #[test]
    fn other_suffixes_are_rejected() {
        for path in ["server.rb", "server.ts", "server", "server.py.bak", "PY", ".py/"] {
            let err = LaunchCommand::for_script(&Runtimes::default(), Path::new(path)).unwrap_err();
            assert!(
                matches!(err, Error::UnsupportedScriptKind { .. }),
                "{path}: {err}"
            );
        }
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert!(ScriptKind::from_path(Path::new("server.PY")).is_err());
        assert!(ScriptKind::from_path(Path::new("server.Js")).is_err());
    }

    #[test]
    fn environment_is_restricted_to_allow_list() {
        for (key, _) in LaunchCommand::environment() {
            assert!(INHERITED_ENV_VARS.contains(&key));
        }
    }
}
