//! Ownership of the tool host session and ordered release of resources.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use mcp::{Launcher, Runtimes, Session, SessionOptions, Tool};
use tracing::{debug, info, warn};

use crate::{Error, Result};

type ReleaseFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Release = Box<dyn FnOnce() -> ReleaseFuture + Send>;

/// Async release actions, run last-in first-out.
#[derive(Default)]
pub struct ResourceStack {
    entries: Vec<(String, Release)>,
}

impl ResourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `release` to run on [`unwind`](Self::unwind).
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = label.into();
        debug!(resource = %label, "resource registered");
        self.entries
            .push((label, Box::new(move || Box::pin(release()) as ReleaseFuture)));
    }

    /// Run every registered action in reverse order of registration.
    ///
    /// Each action runs once; unwinding an empty stack does nothing.
    pub async fn unwind(&mut self) {
        while let Some((label, release)) = self.entries.pop() {
            debug!(resource = %label, "releasing");
            release().await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let labels: Vec<&str> = self.entries.iter().map(|(l, _)| l.as_str()).collect();
            warn!(resources = ?labels, "resource stack dropped without unwinding");
        }
    }
}

/// Holds the active tool host session for the life of the program.
#[derive(Default)]
pub struct Lifecycle {
    resources: ResourceStack,
    session: Option<Arc<Session>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch the tool host for `script`, register its shutdown, and fetch
    /// the tool list once.
    pub async fn connect(
        &mut self,
        launcher: &impl Launcher,
        runtimes: &Runtimes,
        script: &Path,
        options: SessionOptions,
    ) -> Result<(Arc<Session>, Vec<Tool>)> {
        self.ensure_idle()?;
        let session = Session::open(launcher, runtimes, script, options).await?;
        self.adopt(session).await
    }

    /// Take ownership of an already initialized session.
    pub async fn adopt(&mut self, session: Session) -> Result<(Arc<Session>, Vec<Tool>)> {
        self.ensure_idle()?;

        let session = Arc::new(session);
        let closing = Arc::clone(&session);
        self.resources
            .push(format!("session {}", session.name()), move || async move {
                closing.close().await;
            });
        self.session = Some(Arc::clone(&session));

        let tools = session.list_tools().await?;
        info!(
            session = %session.name(),
            tools = tools.len(),
            "connected to tool host"
        );
        Ok((session, tools))
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// Release everything acquired so far. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if self.session.take().is_some() || !self.resources.is_empty() {
            info!("shutting down");
        }
        self.resources.unwind().await;
    }

    fn ensure_idle(&self) -> Result<()> {
        match &self.session {
            Some(session) => Err(Error::InvalidState(format!(
                "session {} is already active",
                session.name()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::mock::MockToolHost;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::process::Child;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(
        log: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> impl FnOnce() -> ReleaseFuture + Send + 'static {
        let log = Arc::clone(log);
        move || {
            Box::pin(async move {
                log.lock().unwrap().push(label);
            }) as ReleaseFuture
        }
    }

    /// Counts spawn attempts and never starts anything.
    #[derive(Default)]
    struct CountingLauncher {
        spawns: AtomicUsize,
    }

    impl Launcher for CountingLauncher {
        fn launch(&self, _command: &mcp::LaunchCommand) -> std::io::Result<Child> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no interpreter"))
        }
    }

    fn weather_host() -> MockToolHost {
        MockToolHost::new(vec![Tool {
            name: "get_weather".into(),
            description: None,
            input_schema: json!({"type": "object"}),
        }])
    }

    #[tokio::test]
    async fn unwind_runs_in_reverse_order() {
        let log = recorder();
        let mut stack = ResourceStack::new();
        stack.push("first", record(&log, "first"));
        stack.push("second", record(&log, "second"));
        stack.push("third", record(&log, "third"));
        assert_eq!(stack.len(), 3);

        stack.unwind().await;

        assert_eq!(*log.lock().unwrap(), ["third", "second", "first"]);
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn unwind_runs_each_action_once() {
        let log = recorder();
        let mut stack = ResourceStack::new();
        stack.push("only", record(&log, "only"));

        stack.unwind().await;
        stack.unwind().await;

        assert_eq!(*log.lock().unwrap(), ["only"]);
    }

    #[tokio::test]
    async fn unsupported_script_acquires_nothing() {
        let launcher = CountingLauncher::default();
        let mut lifecycle = Lifecycle::new();

        let err = lifecycle
            .connect(
                &launcher,
                &Runtimes::default(),
                Path::new("server.rb"),
                SessionOptions::default(),
            )
            .await
            .err().unwrap();

        assert!(matches!(
            err,
            Error::Tool(mcp::Error::UnsupportedScriptKind { .. })
        ));
        assert_eq!(launcher.spawns.load(Ordering::SeqCst), 0);
        assert!(lifecycle.session().is_none());
        assert!(lifecycle.resources.is_empty());
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_failure_is_a_launch_error() {
        let launcher = CountingLauncher::default();
        let mut lifecycle = Lifecycle::new();

        let err = lifecycle
            .connect(
                &launcher,
                &Runtimes::default(),
                Path::new("server.py"),
                SessionOptions::default(),
            )
            .await
            .err().unwrap();

        match err {
            Error::Tool(e) => assert!(e.is_launch(), "{e:?}"),
            other => panic!("expected launch error, got {other:?}"),
        }
        assert_eq!(launcher.spawns.load(Ordering::SeqCst), 1);
        assert!(lifecycle.resources.is_empty());
    }

    #[tokio::test]
    async fn adopt_lists_tools_once_and_shutdown_closes() {
        let host = weather_host();
        let session = host.connect(SessionOptions::default()).await.unwrap();
        let mut lifecycle = Lifecycle::new();

        let (session, tools) = lifecycle.adopt(session).await.unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_weather");
        assert_eq!(host.requests("tools/list"), 1);
        assert!(lifecycle.session().is_some());

        lifecycle.shutdown().await;
        assert!(session.is_closed());
        assert!(lifecycle.session().is_none());

        lifecycle.shutdown().await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn second_session_is_rejected() {
        let host = weather_host();
        let mut lifecycle = Lifecycle::new();
        lifecycle
            .adopt(host.connect(SessionOptions::default()).await.unwrap())
            .await
            .unwrap();

        let extra = host.connect(SessionOptions::default()).await.unwrap();
        let err = lifecycle.adopt(extra).await.err().unwrap();
        assert!(matches!(err, Error::InvalidState(_)));

        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn session_is_released_after_other_resources() {
        let log = recorder();
        let host = weather_host();
        let mut lifecycle = Lifecycle::new();
        lifecycle.resources.push("before", record(&log, "before"));
        let (session, _) = lifecycle
            .adopt(host.connect(SessionOptions::default()).await.unwrap())
            .await
            .unwrap();
        let launcher = Arc::clone(&session);
        let log_after = Arc::clone(&log);
        lifecycle.resources.push("after", move || async move {
            assert!(!launcher.is_closed());
            log_after.lock().unwrap().push("after");
        });

        lifecycle.shutdown().await;

        assert_eq!(*log.lock().unwrap(), ["after", "before"]);
        assert!(session.is_closed());
    }
}
