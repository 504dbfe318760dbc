mod config;
mod credentials;
mod error;
mod repl;

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mcp::{ProcessLauncher, Runtimes, Session, SessionOptions, Tool};
use runtime::{Backend, Dispatcher, Lifecycle};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const DEFAULT_LOG_DIRECTIVE: &str = "warn";

#[derive(Parser)]
#[command(name = "mcp-client")]
#[command(about = "Chat with a model that can call the tools of an MCP server", long_about = None)]
#[command(version)]
struct Cli {
    /// Tool host script to launch (.py or .js)
    script: PathBuf,

    /// Configuration file (default: ./mcp-client.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name, overriding the configuration
    #[arg(short, long)]
    model: Option<String>,

    /// Log filter directive, e.g. "debug" or "mcp=trace" (default: RUST_LOG, then "warn")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never interleave with answers on stdout.
fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid log directive {directive:?}: {e}");
            EnvFilter::new(DEFAULT_LOG_DIRECTIVE)
        }),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let workdir = Path::new(".");
    let config = Config::discover(cli.config.as_deref(), workdir)?;

    let launch = LaunchScript {
        script: &cli.script,
        runtimes: config.runtimes(),
        options: config.session_options(),
    };
    let settings = ChatSettings {
        config: &config,
        model: cli.model.as_deref(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lifecycle = Lifecycle::new();
    run_with(
        &mut lifecycle,
        launch,
        settings,
        || credentials::api_key(workdir),
        stdin.lock(),
        &mut stdout,
    )
    .await
}

/// How the tool host session is obtained.
trait Connect {
    fn connect(
        self,
        lifecycle: &mut Lifecycle,
    ) -> impl Future<Output = runtime::Result<(Arc<Session>, Vec<Tool>)>>;
}

/// Launch the script given on the command line.
struct LaunchScript<'a> {
    script: &'a Path,
    runtimes: Runtimes,
    options: SessionOptions,
}

impl Connect for LaunchScript<'_> {
    async fn connect(
        self,
        lifecycle: &mut Lifecycle,
    ) -> runtime::Result<(Arc<Session>, Vec<Tool>)> {
        lifecycle
            .connect(&ProcessLauncher, &self.runtimes, self.script, self.options)
            .await
    }
}

struct ChatSettings<'a> {
    config: &'a Config,
    /// Overrides `config.model.name`.
    model: Option<&'a str>,
}

/// Connect, chat until the user leaves, then release everything that was
/// acquired, on success, early return and failure alike.
async fn run_with<C, R, W>(
    lifecycle: &mut Lifecycle,
    connect: C,
    settings: ChatSettings<'_>,
    api_key: impl FnOnce() -> Option<String>,
    input: R,
    output: &mut W,
) -> Result<()>
where
    C: Connect,
    R: BufRead,
    W: Write,
{
    let outcome = converse(lifecycle, connect, settings, api_key, input, output).await;
    lifecycle.shutdown().await;
    outcome
}

async fn converse<C, R, W>(
    lifecycle: &mut Lifecycle,
    connect: C,
    settings: ChatSettings<'_>,
    api_key: impl FnOnce() -> Option<String>,
    input: R,
    output: &mut W,
) -> Result<()>
where
    C: Connect,
    R: BufRead,
    W: Write,
{
    let (session, tools) = connect.connect(lifecycle).await?;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    writeln!(output, "\nConnected to server with tools: {names:?}")?;

    let Some(api_key) = api_key() else {
        let var = credentials::API_KEY_VAR;
        writeln!(
            output,
            "\nNo {var} found. To query these tools with OpenAI, set your API key:"
        )?;
        writeln!(output, "  export {var}=your-api-key-here")?;
        writeln!(
            output,
            "or add {var}=your-api-key-here to a {} file in this directory.",
            credentials::DOTENV_FILE
        )?;
        return Ok(());
    };

    let backend = settings.config.backend(api_key, settings.model);
    tracing::info!(backend = %backend, "model endpoint ready");
    let handler = Chat {
        dispatcher: Dispatcher::new(backend),
        session: &session,
    };

    repl::run(input, output, &handler).await?;
    Ok(())
}

/// Answers queries with the model and the connected tool host.
struct Chat<'a, B> {
    dispatcher: Dispatcher<B>,
    session: &'a Session,
}

impl<B: Backend> repl::QueryHandler for Chat<'_, B> {
    type Error = runtime::Error;

    async fn answer(&self, query: &str) -> std::result::Result<String, runtime::Error> {
        self.dispatcher.dispatch(self.session, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use mcp::mock::MockToolHost;
    use serde_json::json;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::Mutex;

    /// Hands an in-memory session to the lifecycle and keeps a handle to it.
    struct Adopt {
        session: Session,
        adopted: Arc<Mutex<Option<Arc<Session>>>>,
    }

    impl Connect for Adopt {
        async fn connect(
            self,
            lifecycle: &mut Lifecycle,
        ) -> runtime::Result<(Arc<Session>, Vec<Tool>)> {
            let (session, tools) = lifecycle.adopt(self.session).await?;
            *self.adopted.lock().unwrap() = Some(Arc::clone(&session));
            Ok((session, tools))
        }
    }

    /// Fails the first time the connector is used.
    struct Refuse;

    impl Connect for Refuse {
        async fn connect(
            self,
            _lifecycle: &mut Lifecycle,
        ) -> runtime::Result<(Arc<Session>, Vec<Tool>)> {
            Err(runtime::Error::InvalidState("no tool host".into()))
        }
    }

    /// Standard input that has gone away.
    struct BrokenInput;

    impl Read for BrokenInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        }
    }

    async fn adopt_mock() -> (Adopt, Arc<Mutex<Option<Arc<Session>>>>) {
        let host = MockToolHost::new(vec![Tool {
            name: "get_weather".into(),
            description: Some("Current weather".into()),
            input_schema: json!({"type": "object"}),
        }]);
        let session = host.connect(SessionOptions::default()).await.unwrap();
        let adopted = Arc::new(Mutex::new(None));
        let connect = Adopt {
            session,
            adopted: Arc::clone(&adopted),
        };
        (connect, adopted)
    }

    fn adopted_session(slot: &Mutex<Option<Arc<Session>>>) -> Arc<Session> {
        slot.lock().unwrap().clone().expect("session was adopted")
    }

    #[tokio::test]
    async fn missing_credential_exits_cleanly_and_closes_session() {
        let (connect, adopted) = adopt_mock().await;
        let config = Config::default();
        let mut lifecycle = Lifecycle::new();
        let mut output = Vec::new();

        run_with(
            &mut lifecycle,
            connect,
            ChatSettings {
                config: &config,
                model: None,
            },
            || None,
            Cursor::new("never read\n"),
            &mut output,
        )
        .await
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains(r#"Connected to server with tools: ["get_weather"]"#));
        assert!(output.contains("export OPENAI_API_KEY=your-api-key-here"));
        assert!(!output.contains("Query: "));
        assert!(adopted_session(&adopted).is_closed());
        assert!(lifecycle.session().is_none());
    }

    #[tokio::test]
    async fn input_failure_is_reported_and_session_closed() {
        let (connect, adopted) = adopt_mock().await;
        let config = Config::default();
        let mut lifecycle = Lifecycle::new();
        let mut output = Vec::new();

        let err = run_with(
            &mut lifecycle,
            connect,
            ChatSettings {
                config: &config,
                model: None,
            },
            || Some("sk-test".into()),
            BufReader::new(BrokenInput),
            &mut output,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert!(adopted_session(&adopted).is_closed());
        assert!(lifecycle.session().is_none());
    }

    #[tokio::test]
    async fn quit_closes_session() {
        let (connect, adopted) = adopt_mock().await;
        let config = Config::default();
        let mut lifecycle = Lifecycle::new();
        let mut output = Vec::new();

        run_with(
            &mut lifecycle,
            connect,
            ChatSettings {
                config: &config,
                model: Some("gpt-4o-mini"),
            },
            || Some("sk-test".into()),
            Cursor::new("QUIT\n"),
            &mut output,
        )
        .await
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Query: "));
        assert!(adopted_session(&adopted).is_closed());
    }

    #[tokio::test]
    async fn connect_failure_still_shuts_down() {
        let config = Config::default();
        let mut lifecycle = Lifecycle::new();
        let mut output = Vec::new();
        let mut asked_for_key = false;

        let err = run_with(
            &mut lifecycle,
            Refuse,
            ChatSettings {
                config: &config,
                model: None,
            },
            || {
                asked_for_key = true;
                None
            },
            Cursor::new(""),
            &mut output,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Runtime(runtime::Error::InvalidState(_))));
        assert!(!asked_for_key);
        assert!(output.is_empty());
        assert!(lifecycle.session().is_none());
    }
}
