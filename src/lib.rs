//! Terminal monitoring console for an openclaw agent.
//!
//! The console follows the agent's global log tail or replays one
//! conversation session and then follows it live, while polling gateway
//! health and the session directory in the background.
//!
//! # Architecture
//!
//! - `transport`: SSE connection to the monitor backend and wire decoding
//! - `engine`: stream sessions, reconnect policy, event buffer and filtering
//! - `bus`: broadcast of render updates and batched delivery to a presenter
//! - `render`: terminal formatting of events, sessions and status lines
//! - `api`: request/response endpoints (health, sessions, system, version)
//! - `config`, `cli`, `console`: settings, argument parsing, the driver loop

pub mod api;
pub mod bus;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod render;
pub mod transport;

#[cfg(test)]
mod testing;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use api::{sort_sessions, ApiError, BackendApi, BackendClient, HealthMonitor};
use bus::{BusEvent, EventBatcher, EventBus, Presenter, SinkUpdate};
use cli::{Cli, Commands};
use config::{ConfigError, MonitorConfig};
use console::{Command, Console, PollIntervals, View};
use render::{HealthLine, TerminalPresenter};
use transport::TransportError;

const BATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "clawmon=debug,clawmon_lib=debug,warn"
    } else {
        "clawmon=info,clawmon_lib=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn use_color(no_color: bool) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal()
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let config = cli.config()?;
    let color = use_color(cli.no_color);
    let client = connect(&config).await?;
    tracing::debug!(base_url = %client.base_url(), "backend client ready");

    match cli.command {
        Commands::Health => print_health(Arc::new(client), color).await,
        Commands::Version => {
            let version = client.version().await?;
            present_once(SinkUpdate::Version(version), color)
        }
        Commands::Sessions => {
            let mut sessions = client.sessions().await?;
            sort_sessions(&mut sessions);
            present_once(SinkUpdate::Sessions(Arc::new(sessions)), color)
        }
        Commands::System => interactive(client, &config, View::System, None, color).await,
        Commands::Session { session_id } => {
            interactive(client, &config, View::Session(session_id), None, color).await
        }
        Commands::Live { filter, search } => {
            interactive(client, &config, View::Live, Some((filter, search)), color).await
        }
    }
}

async fn connect(config: &MonitorConfig) -> Result<BackendClient, AppError> {
    let mut client = BackendClient::new(&config.base_url, config.request_timeout())?;
    if let Some(password) = &config.password {
        client.login(password).await?;
        tracing::info!("logged in to monitor backend");
    }
    Ok(client)
}

async fn print_health(api: Arc<dyn BackendApi>, color: bool) -> Result<(), AppError> {
    let Some(report) = HealthMonitor::new(api).poll().await else {
        return Ok(());
    };
    let mut out = io::stdout().lock();
    writeln!(out, "{}", HealthLine { report: &report, color })?;
    if let Some(output) = report.status.as_ref().and_then(|s| s.output.as_deref()) {
        writeln!(out, "{}", output.trim_end())?;
    }
    Ok(())
}

fn present_once(update: SinkUpdate, color: bool) -> Result<(), AppError> {
    let mut presenter = TerminalPresenter::new(io::stdout(), color);
    presenter.present(&[BusEvent { seq: 0, update }]);
    Ok(())
}

async fn interactive(
    client: BackendClient,
    config: &MonitorConfig,
    initial: View,
    live_options: Option<(engine::CategoryFilter, Option<String>)>,
    color: bool,
) -> Result<(), AppError> {
    let connector = Arc::new(client.stream_connector()?);
    let api: Arc<dyn BackendApi> = Arc::new(client);

    let bus = Arc::new(EventBus::new());
    let presenter = TerminalPresenter::new(io::stdout(), color);
    let batcher = EventBatcher::start(bus.subscribe(), presenter, config.batch_policy());

    let intervals = PollIntervals {
        health: config.health_interval(),
        sessions: config.sessions_interval(),
    };
    let mut console = Console::new(
        Arc::clone(&bus),
        connector,
        api,
        config.stream_settings(),
        intervals,
    );
    if let Some((filter, search)) = live_options {
        console.apply(Command::Filter(filter));
        if let Some(query) = search {
            console.apply(Command::Search(query));
        }
    }

    let (commands, stdin_reader) = console::spawn_stdin_reader();
    console.run(initial, commands).await;
    stdin_reader.abort();

    // The batcher exits once every sender is gone and the last batch is flushed.
    drop(bus);
    if tokio::time::timeout(BATCHER_DRAIN_TIMEOUT, batcher).await.is_err() {
        tracing::warn!("timed out flushing pending output");
    }
    Ok(())
}
