//! Interactive console: the view controller and its driver loop.
//!
//! One task owns the [`StreamManager`] and reacts, one handler at a time, to
//! stream signals, stdin commands, poll ticks and Ctrl-C. Pollers run in
//! spawned tasks behind their own single-flight guards and publish straight to
//! the bus.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::{short_id, BackendApi, HealthMonitor, SessionDirectory};
use crate::bus::{BusSink, EventBus, SinkUpdate};
use crate::engine::{CategoryFilter, ConnectionState, Inbound, StreamManager, StreamSettings};
use crate::transport::StreamConnector;

pub const SYSTEM_REFRESH: Duration = Duration::from_secs(30);

const HELP: &str = "commands: /filter <all|queue|run|tool|session|error>, /search [text], \
/clear, /live, /system, /session <id>, /sessions, /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Live,
    System,
    Session(String),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live logs"),
            Self::System => f.write_str("system"),
            Self::Session(id) => write!(f, "session {}", short_id(id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Filter(CategoryFilter),
    /// Empty text clears the search.
    Search(String),
    Clear,
    Live,
    System,
    Session(String),
    Sessions,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match name {
            "/filter" | "/f" => {
                if arg.is_empty() {
                    return Err("usage: /filter <all|queue|run|tool|session|error>".to_string());
                }
                Self::Filter(arg.parse()?)
            }
            "/search" | "/s" => Self::Search(arg.to_string()),
            "/clear" => Self::Clear,
            "/live" => Self::Live,
            "/system" => Self::System,
            "/session" => {
                if arg.is_empty() {
                    return Err("usage: /session <id>".to_string());
                }
                Self::Session(arg.to_string())
            }
            "/sessions" => Self::Sessions,
            "/help" | "/?" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            other => return Err(format!("unknown command {other}. {HELP}")),
        };
        Ok(Some(command))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub health: Duration,
    pub sessions: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(3),
            sessions: Duration::from_secs(5),
        }
    }
}

pub struct Console {
    manager: StreamManager<BusSink>,
    inbound: Option<mpsc::UnboundedReceiver<Inbound>>,
    bus: Arc<EventBus>,
    api: Arc<dyn BackendApi>,
    health: Arc<HealthMonitor>,
    directory: Arc<SessionDirectory>,
    intervals: PollIntervals,
    view: Option<View>,
    system_timer: Option<JoinHandle<()>>,
}

impl Console {
    pub fn new(
        bus: Arc<EventBus>,
        connector: Arc<dyn StreamConnector>,
        api: Arc<dyn BackendApi>,
        settings: StreamSettings,
        intervals: PollIntervals,
    ) -> Self {
        let (manager, inbound) = StreamManager::new(BusSink::new(Arc::clone(&bus)), connector, settings);
        Self {
            manager,
            inbound: Some(inbound),
            health: Arc::new(HealthMonitor::new(Arc::clone(&api))),
            directory: Arc::new(SessionDirectory::new(Arc::clone(&api))),
            bus,
            api,
            intervals,
            view: None,
            system_timer: None,
        }
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn manager(&self) -> &StreamManager<BusSink> {
        &self.manager
    }

    pub fn has_system_timer(&self) -> bool {
        self.system_timer.is_some()
    }

    /// Leave the current view and enter `view`. The active stream session is
    /// always stopped first.
    pub fn switch_view(&mut self, view: View) {
        self.manager.stop();
        if let Some(timer) = self.system_timer.take() {
            timer.abort();
        }
        info!(%view, "switching view");

        match &view {
            View::Live => {
                self.manager.start_live_tail();
            }
            View::System => {
                self.manager.clear();
                self.bus
                    .publish(SinkUpdate::Connection(ConnectionState::Connected));
                self.system_timer = Some(self.spawn_system_refresh());
            }
            View::Session(id) => {
                self.manager.start_session_replay(id.clone());
                self.spawn_session_banner(id.clone());
            }
        }
        self.bus.publish(SinkUpdate::Notice(format!("viewing {view}")));
        self.view = Some(view);
    }

    /// Apply one command. Returns false when the console should exit.
    pub fn apply(&mut self, command: Command) -> bool {
        debug!(?command, "console command");
        match command {
            Command::Filter(category) => {
                self.manager.set_filter(category);
                self.notice(format!("filter: {category}"));
            }
            Command::Search(query) => {
                let cleared = query.is_empty();
                self.manager.set_query(query);
                if cleared {
                    self.notice("search cleared".to_string());
                }
            }
            Command::Clear => self.manager.clear(),
            Command::Live => self.switch_view(View::Live),
            Command::System => self.switch_view(View::System),
            Command::Session(id) => self.switch_view(View::Session(id)),
            Command::Sessions => self.spawn_sessions_poll(true),
            Command::Help => self.notice(HELP.to_string()),
            Command::Quit => return false,
        }
        true
    }

    /// Drive the console until `/quit`, end of input or Ctrl-C.
    pub async fn run(self, initial: View, commands: mpsc::UnboundedReceiver<String>) {
        self.run_until(initial, commands, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    pub async fn run_until(
        mut self,
        initial: View,
        mut commands: mpsc::UnboundedReceiver<String>,
        shutdown: impl Future<Output = ()>,
    ) {
        let Some(mut inbound) = self.inbound.take() else {
            return;
        };
        tokio::pin!(shutdown);

        let mut health_tick = tokio::time::interval(self.intervals.health);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sessions_tick = tokio::time::interval(self.intervals.sessions);
        sessions_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.switch_view(initial);

        loop {
            tokio::select! {
                Some(signal) = inbound.recv() => self.manager.handle(signal),
                line = commands.recv() => {
                    let Some(line) = line else {
                        debug!("input closed");
                        break;
                    };
                    match Command::parse(&line) {
                        Ok(Some(command)) => {
                            if !self.apply(command) {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(message) => self.notice(message),
                    }
                }
                _ = health_tick.tick() => self.spawn_health_poll(),
                _ = sessions_tick.tick() => self.spawn_sessions_poll(false),
                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    break;
                }
            }
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.manager.stop();
        if let Some(timer) = self.system_timer.take() {
            timer.abort();
        }
        info!("console stopped");
    }

    fn notice(&self, message: String) {
        self.bus.publish(SinkUpdate::Notice(message));
    }

    fn spawn_health_poll(&self) {
        let health = Arc::clone(&self.health);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Some(report) = health.poll().await {
                bus.publish(SinkUpdate::Health(report));
            }
        });
    }

    fn spawn_sessions_poll(&self, show: bool) {
        let directory = Arc::clone(&self.directory);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            match directory.poll().await {
                Some(Ok(sessions)) if show => {
                    bus.publish(SinkUpdate::Sessions(Arc::new(sessions)));
                }
                Some(Err(err)) if show => {
                    bus.publish(SinkUpdate::Notice(format!("sessions unavailable: {err}")));
                }
                None if show => {
                    bus.publish(SinkUpdate::Notice("sessions refresh already running".to_string()));
                }
                _ => {}
            }
        });
    }

    fn spawn_system_refresh(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SYSTEM_REFRESH);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                match api.system().await {
                    Ok(snapshot) => {
                        bus.publish(SinkUpdate::System(Arc::new(snapshot)));
                    }
                    Err(err) => {
                        bus.publish(SinkUpdate::Notice(format!("system unavailable: {err}")));
                    }
                }
            }
        })
    }

    fn spawn_session_banner(&self, id: String) {
        let directory = Arc::clone(&self.directory);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Some(session) = directory.find(&id).await {
                let models: Vec<&str> = session.models.keys().map(String::as_str).collect();
                let models = if models.is_empty() {
                    session.model.clone().unwrap_or_else(|| "—".to_string())
                } else {
                    models.join(" / ")
                };
                bus.publish(SinkUpdate::Notice(format!(
                    "{} · {} · {} msgs",
                    session.display_label(),
                    models,
                    session.message_count
                )));
            }
        });
    }
}

/// Forward stdin lines into a channel until EOF.
pub fn spawn_stdin_reader() -> (mpsc::UnboundedReceiver<String>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::SessionSummary;
    use crate::testing::{ScriptedConnector, StaticApi};
    use crate::transport::StreamTarget;

    fn console(connector: Arc<ScriptedConnector>, api: Arc<StaticApi>) -> (Console, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let console = Console::new(
            Arc::clone(&bus),
            connector,
            api,
            StreamSettings::default(),
            PollIntervals::default(),
        );
        (console, bus)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<crate::bus::BusEvent>) -> Vec<SinkUpdate> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.update)
            .collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/filter tool"),
            Ok(Some(Command::Filter(CategoryFilter::Tool)))
        );
        assert_eq!(
            Command::parse("/search  lane=main "),
            Ok(Some(Command::Search("lane=main".into())))
        );
        assert_eq!(Command::parse("/search"), Ok(Some(Command::Search(String::new()))));
        assert_eq!(
            Command::parse("/session abc-123"),
            Ok(Some(Command::Session("abc-123".into())))
        );
        assert_eq!(Command::parse("/q"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("   "), Ok(None));
        assert!(Command::parse("/filter nope").is_err());
        assert!(Command::parse("/session").is_err());
        assert!(Command::parse("hello").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_view_sets_connected_and_stops_stream() {
        let connector = ScriptedConnector::new();
        let _feed = connector.feed_next(StreamTarget::LiveTail);
        let api = Arc::new(StaticApi::default());
        let (mut console, bus) = console(Arc::clone(&connector), Arc::clone(&api));
        let mut rx = bus.subscribe();

        console.switch_view(View::Live);
        assert_eq!(console.manager().active_target(), Some(&StreamTarget::LiveTail));

        console.switch_view(View::System);
        assert!(console.manager().active_session().is_none());
        assert!(console.has_system_timer());
        let updates = drain(&mut rx);
        assert!(updates
            .iter()
            .any(|update| matches!(update, SinkUpdate::Connection(ConnectionState::Connected))));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(api.system_calls.load(Ordering::SeqCst), 3);

        console.switch_view(View::Live);
        assert!(!console.has_system_timer());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(api.system_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_commands_drive_manager() {
        let connector = ScriptedConnector::new();
        let _feed = connector.feed_next(StreamTarget::LiveTail);
        let (mut console, _bus) = console(connector, Arc::new(StaticApi::default()));
        console.switch_view(View::Live);

        assert!(console.apply(Command::Filter(CategoryFilter::Error)));
        assert_eq!(console.manager().filter().category(), CategoryFilter::Error);
        assert!(console.apply(Command::Search("boom".into())));
        assert_eq!(console.manager().filter().query(), "boom");
        assert!(console.apply(Command::Session("abc".into())));
        assert_eq!(console.view(), Some(&View::Session("abc".into())));
        assert!(!console.apply(Command::Quit));
    }

    #[tokio::test]
    async fn test_sessions_command_publishes_listing() {
        let api = Arc::new(StaticApi::default());
        api.sessions.lock().unwrap().push(SessionSummary {
            id: "s1".into(),
            ..SessionSummary::default()
        });
        let (mut console, bus) = console(ScriptedConnector::new(), api);
        let mut rx = bus.subscribe();

        console.apply(Command::Sessions);
        let mut listed = None;
        for _ in 0..32 {
            tokio::task::yield_now().await;
            if let Some(SinkUpdate::Sessions(sessions)) = drain(&mut rx)
                .into_iter()
                .find(|update| matches!(update, SinkUpdate::Sessions(_)))
            {
                listed = Some(sessions);
                break;
            }
        }
        assert_eq!(listed.map(|sessions| sessions.len()), Some(1));
    }

    #[tokio::test]
    async fn test_run_exits_on_quit_and_stops_stream() {
        let connector = ScriptedConnector::new();
        let _feed = connector.feed_next(StreamTarget::LiveTail);
        let (console, bus) = console(Arc::clone(&connector), Arc::new(StaticApi::default()));
        let mut rx = bus.subscribe();
        let (tx, commands) = mpsc::unbounded_channel();
        tx.send("/filter run".to_string()).unwrap();
        tx.send("/bogus".to_string()).unwrap();
        tx.send("/quit".to_string()).unwrap();

        console
            .run_until(View::Live, commands, std::future::pending())
            .await;

        assert!(connector.attempts(&StreamTarget::LiveTail) <= 1);
        let notices: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|update| match update {
                SinkUpdate::Notice(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(notices.first().map(String::as_str), Some("viewing live logs"));
        assert!(notices.iter().any(|notice| notice == "filter: run"));
        assert!(notices.iter().any(|notice| notice.starts_with("unknown command /bogus")));
    }
}
