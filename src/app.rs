//! Application shell — terminal UI, event wiring, and the main event loop.
//!
//! Architecture:
//! - `App` owns all UI state plus the `PlayerSupervisor`.
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background
//!   tasks (terminal input reader, now-playing poller, watchdog, restart
//!   timers).
//! - Only this loop mutates application state; the watchdog and poller hand
//!   off through the channel.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use ratatui::crossterm::{
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, Preferences};
use crate::error::FetchError;
use crate::notify;
use crate::now_playing::UNKNOWN_TRACK;
use crate::player::{PlayerEvent, PlayerSupervisor, RestartPolicy};
use crate::stations::StationRegistry;
use crate::system;
use crate::theme;
use crate::widgets::toast::ToastManager;

const VOLUME_STEP: i16 = 5;

// ── Internal event bus ────────────────────────────────────────────────────────

pub enum AppMessage {
    /// A terminal input event from the blocking reader task.
    Terminal(Event),
    /// Outcome of one now-playing poll tick.
    NowPlaying(Result<Option<String>, FetchError>),
    /// Forwarded from the playback watchdog.
    Player(PlayerEvent),
    /// A scheduled restart delay has elapsed.
    RestartDue,
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    config: Config,
    prefs: Preferences,
    prefs_path: PathBuf,
    registry: StationRegistry,

    supervisor: PlayerSupervisor,
    restart_policy: RestartPolicy,
    /// User intent: true from a successful start until stop/give-up. Restarts
    /// only happen while this holds.
    want_playing: bool,
    /// Station index of the active session (marker in the list).
    playing_index: Option<usize>,
    /// Stream URL of the active session, reused verbatim on restart.
    current_url: Option<String>,

    selected: usize,
    now_playing: String,
    toasts: ToastManager,

    tx: mpsc::Sender<AppMessage>,
    should_quit: bool,
}

impl App {
    pub fn new(
        config: Config,
        prefs: Preferences,
        prefs_path: PathBuf,
        registry: StationRegistry,
        supervisor: PlayerSupervisor,
        tx: mpsc::Sender<AppMessage>,
    ) -> Self {
        let restart_policy = RestartPolicy::new(&config.watchdog);
        let selected = if registry.is_empty() {
            0
        } else {
            prefs.station_index.min(registry.len() - 1)
        };
        Self {
            config,
            prefs,
            prefs_path,
            registry,
            supervisor,
            restart_policy,
            want_playing: false,
            playing_index: None,
            current_url: None,
            selected,
            now_playing: UNKNOWN_TRACK.to_string(),
            toasts: ToastManager::new(),
            tx,
            should_quit: false,
        }
    }

    /// Surface a startup problem (e.g. unreadable prefs) once the UI is up.
    pub fn startup_warning(&mut self, message: impl Into<String>) {
        self.toasts.warning(message);
    }

    // ── event loop ────────────────────────────────────────────────────────────

    pub async fn run(mut self, mut rx: mpsc::Receiver<AppMessage>) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let _input_reader = spawn_input_reader(self.tx.clone());

        let mut tick = tokio::time::interval(Duration::from_millis(200));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let run_result = loop {
            if let Err(e) = terminal.draw(|f| self.draw(f)) {
                break Err(anyhow::Error::from(e));
            }

            let msg = tokio::select! {
                msg = rx.recv() => msg,
                _ = tick.tick() => None,
            };
            match msg {
                Some(msg) => self.handle_message(msg).await,
                None => self.toasts.tick(),
            }

            if self.should_quit {
                break Ok(());
            }
        };

        self.shutdown().await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        run_result
    }

    /// Persist selection, then stop playback synchronously before the
    /// terminal is handed back.
    async fn shutdown(&mut self) {
        info!("shutting down");
        if let Err(e) = self.prefs.save(&self.prefs_path) {
            warn!("prefs: {}", e);
        }
        self.want_playing = false;
        if let Err(e) = self.supervisor.stop().await {
            warn!("player: {}", e);
        }
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Terminal(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key).await;
            }
            AppMessage::Terminal(_) => {}

            AppMessage::NowPlaying(Ok(Some(text))) => {
                if text != self.now_playing {
                    info!("now playing: {}", text);
                    self.now_playing = text.clone();
                    notify::notify_now_playing(
                        "Skyrock Radio",
                        &format!("Now playing: {}", text),
                    );
                }
            }
            AppMessage::NowPlaying(Ok(None)) => {
                // Page loaded but the fragment wasn't there — selector drift.
                debug!("now playing: no matching element");
                self.toasts.warning("now playing: nothing found on page");
            }
            AppMessage::NowPlaying(Err(e)) => {
                warn!("now playing: {}", e);
                self.toasts.warning(format!("now playing: {}", e));
            }

            AppMessage::Player(PlayerEvent::Died) => self.handle_player_death().await,
            AppMessage::RestartDue => self.attempt_restart().await,
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Up => self.select_station(-1),
            KeyCode::Down => self.select_station(1),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_playback().await,
            KeyCode::Left | KeyCode::Char('-') => self.adjust_volume(-VOLUME_STEP),
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => {
                self.adjust_volume(VOLUME_STEP)
            }
            _ => {}
        }
    }

    // ── station selection ─────────────────────────────────────────────────────

    /// Move the selection and persist it. Changing station never auto-plays;
    /// it only cues the change sound.
    fn select_station(&mut self, delta: i32) {
        if self.registry.is_empty() {
            return;
        }
        let max = self.registry.len() - 1;
        let next = if delta < 0 {
            self.selected.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (self.selected + delta as usize).min(max)
        };
        if next == self.selected {
            return;
        }
        self.selected = next;
        system::play_cue(&self.config.sounds.station_change);
        self.prefs.station_index = next;
        self.persist_prefs();
    }

    // ── playback ──────────────────────────────────────────────────────────────

    async fn toggle_playback(&mut self) {
        if self.want_playing {
            self.stop_playback().await;
        } else {
            self.start_playback().await;
        }
    }

    async fn start_playback(&mut self) {
        let Some(station) = self.registry.get(self.selected) else {
            self.toasts.error("no station selected");
            return;
        };
        let name = station.name.clone();
        let url = station.url.clone();

        match self.supervisor.start(&url, self.prefs.volume).await {
            Ok(()) => {
                self.want_playing = true;
                self.playing_index = Some(self.selected);
                self.current_url = Some(url);
                self.restart_policy.reset();
                self.restart_policy.record_start();
                self.toasts.info(format!("playing {}", name));
                system::play_cue(&self.config.sounds.start);
            }
            Err(e) => {
                warn!("player: {}", e);
                self.toasts.error(e.to_string());
            }
        }
    }

    async fn stop_playback(&mut self) {
        self.want_playing = false;
        self.restart_policy.reset();
        if let Err(e) = self.supervisor.stop().await {
            warn!("player: {}", e);
            self.toasts.error(e.to_string());
        }
        self.playing_index = None;
        self.current_url = None;
        system::play_cue(&self.config.sounds.stop);
    }

    /// The watchdog saw the child die without a stop request. Relaunch after
    /// a backoff delay, up to the configured ceiling.
    async fn handle_player_death(&mut self) {
        if !self.want_playing {
            return;
        }
        match self.restart_policy.next_delay() {
            None => {
                warn!("player: restart ceiling reached, giving up");
                self.toasts.error("player keeps dying — giving up");
                self.want_playing = false;
                self.playing_index = None;
                self.current_url = None;
            }
            Some(delay) => {
                self.toasts
                    .warning(format!("player died — restarting in {}s", delay.as_secs()));
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(AppMessage::RestartDue).await;
                });
            }
        }
    }

    async fn attempt_restart(&mut self) {
        if !self.want_playing || self.supervisor.is_playing().await {
            return;
        }
        let Some(url) = self.current_url.clone() else {
            return;
        };
        self.restart_policy.record_start();
        if let Err(e) = self.supervisor.start(&url, self.prefs.volume).await {
            warn!("player: restart failed: {}", e);
            self.toasts.error(e.to_string());
            // Feed the failure back through the death path so the backoff
            // ceiling still applies to launch errors.
            let _ = self.tx.send(AppMessage::Player(PlayerEvent::Died)).await;
        }
    }

    // ── volume ────────────────────────────────────────────────────────────────

    fn adjust_volume(&mut self, delta: i16) {
        let volume = step_volume(self.prefs.volume, delta);
        if volume == self.prefs.volume {
            return;
        }
        self.prefs.volume = volume;
        tokio::spawn(async move {
            if let Err(e) = system::set_system_volume(volume).await {
                warn!("volume: {}", e);
            }
        });
        self.persist_prefs();
    }

    fn persist_prefs(&mut self) {
        if let Err(e) = self.prefs.save(&self.prefs_path) {
            warn!("prefs: {}", e);
            self.toasts.error(e.to_string());
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Min(5),    // station list
                Constraint::Length(3), // now playing
                Constraint::Length(3), // volume
                Constraint::Length(1), // key hints
            ])
            .split(area);

        self.draw_title(frame, rows[0]);
        self.draw_stations(frame, rows[1]);
        self.draw_now_playing(frame, rows[2]);
        self.draw_volume(frame, rows[3]);
        self.draw_hints(frame, rows[4]);

        self.toasts.draw(frame, area);
    }

    fn draw_title(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                " SKYROCK RADIO ",
                theme::style_accent(),
            ))),
            area,
        );
    }

    fn draw_stations(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .registry
            .iter()
            .enumerate()
            .map(|(idx, station)| {
                let marker = if self.playing_index == Some(idx) {
                    Span::styled("▶ ", theme::style_playing())
                } else {
                    Span::raw("  ")
                };
                ListItem::new(Line::from(vec![
                    marker,
                    Span::styled(station.name.clone(), theme::style_default()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" stations ")
                    .borders(Borders::ALL)
                    .border_style(theme::style_border()),
            )
            .highlight_style(theme::style_selected());

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_now_playing(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("♪ ", theme::style_accent()),
                Span::styled(self.now_playing.clone(), theme::style_default()),
            ]))
            .block(
                Block::default()
                    .title(" now playing ")
                    .borders(Borders::ALL)
                    .border_style(theme::style_border()),
            ),
            area,
        );
    }

    fn draw_volume(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(
            Gauge::default()
                .block(
                    Block::default()
                        .title(" volume ")
                        .borders(Borders::ALL)
                        .border_style(theme::style_border()),
                )
                .gauge_style(theme::style_accent())
                .percent(self.prefs.volume.min(100) as u16),
            area,
        );
    }

    fn draw_hints(&self, frame: &mut Frame, area: Rect) {
        let state = if self.want_playing { "stop" } else { "play" };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" ↑/↓ station · enter {} · ←/→ volume · q quit", state),
                theme::style_secondary(),
            ))),
            area,
        );
    }
}

/// Clamped volume arithmetic for the slider keys.
fn step_volume(current: u8, delta: i16) -> u8 {
    (current as i16 + delta).clamp(0, 100) as u8
}

/// Terminal input is blocking, so it gets its own thread-backed task that
/// forwards every event into the bus. The poll timeout keeps the task from
/// parking in `read()` past shutdown — once the receiver is dropped the loop
/// notices within one timeout and exits, so runtime teardown doesn't wait
/// for a final keypress.
fn spawn_input_reader(tx: mpsc::Sender<AppMessage>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || loop {
        if tx.is_closed() {
            break;
        }
        match ratatui::crossterm::event::poll(Duration::from_millis(200)) {
            Ok(false) => continue,
            Ok(true) => match ratatui::crossterm::event::read() {
                Ok(event) => {
                    if tx.blocking_send(AppMessage::Terminal(event)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("input: read error: {}", e);
                    break;
                }
            },
            Err(e) => {
                warn!("input: poll error: {}", e);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlayerConfig, WatchdogConfig};
    use crate::stations::Station;

    #[test]
    fn volume_steps_clamp_at_bounds() {
        assert_eq!(step_volume(50, 5), 55);
        assert_eq!(step_volume(50, -5), 45);
        assert_eq!(step_volume(3, -5), 0);
        assert_eq!(step_volume(98, 5), 100);
        assert_eq!(step_volume(0, -5), 0);
        assert_eq!(step_volume(100, 5), 100);
    }

    /// App wired to a single test station, with the bus and watchdog
    /// channels handed back for the test to drive.
    fn test_app(
        player: PlayerConfig,
        watchdog: WatchdogConfig,
        volume: u8,
    ) -> (
        App,
        mpsc::Receiver<AppMessage>,
        mpsc::Receiver<PlayerEvent>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.player = player;
        config.watchdog = watchdog;

        let prefs = Preferences {
            station_index: 0,
            volume,
        };
        let registry = StationRegistry::from_stations(vec![Station {
            name: "Test FM".to_string(),
            url: "http://example.com/stream".to_string(),
        }]);

        let (tx, rx) = mpsc::channel(64);
        let (player_tx, player_rx) = mpsc::channel(8);
        let supervisor = PlayerSupervisor::new(config.player.clone(), player_tx);
        let app = App::new(
            config,
            prefs,
            dir.path().join("prefs.toml"),
            registry,
            supervisor,
            tx,
        );
        (app, rx, player_rx, dir)
    }

    async fn wait_for_file(path: &std::path::Path) {
        for _ in 0..50 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("file not written: {}", path.display());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unexpected_death_triggers_one_restart_with_last_volume() {
        let record = tempfile::tempdir().unwrap();
        let args_file = record.path().join("launch_args");
        // The fixture records the --volume/url pair it was launched with,
        // then dies immediately to trip the watchdog.
        let script = format!("echo \"$0 $1 $2\" > '{}'; exit 0", args_file.display());
        let player = PlayerConfig {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), script],
            stop_grace_secs: 5,
        };
        let watchdog = WatchdogConfig {
            max_restarts: 3,
            backoff_base_secs: 0,
            backoff_cap_secs: 0,
            quiet_reset_secs: 60,
        };
        let (mut app, mut rx, mut player_rx, _dir) = test_app(player, watchdog, 73);

        app.start_playback().await;
        assert!(app.want_playing);
        assert_eq!(app.current_url.as_deref(), Some("http://example.com/stream"));

        wait_for_file(&args_file).await;
        let first = std::fs::read_to_string(&args_file).unwrap();
        assert!(first.contains("--volume 73 http://example.com/stream"));

        let died = tokio::time::timeout(Duration::from_secs(5), player_rx.recv())
            .await
            .expect("watchdog reports the death")
            .unwrap();
        assert_eq!(died, PlayerEvent::Died);

        // Volume changed after launch — the relaunch must use the new value
        // with the unchanged stream URL.
        app.prefs.volume = 31;
        std::fs::remove_file(&args_file).unwrap();

        app.handle_message(AppMessage::Player(PlayerEvent::Died)).await;
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("a restart is scheduled")
            .unwrap();
        assert!(matches!(msg, AppMessage::RestartDue));
        app.handle_message(AppMessage::RestartDue).await;

        wait_for_file(&args_file).await;
        let second = std::fs::read_to_string(&args_file).unwrap();
        assert!(second.contains("--volume 31 http://example.com/stream"));
        assert!(app.want_playing);

        // One death schedules exactly one restart.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_ceiling_gives_up_and_clears_session() {
        let player = PlayerConfig {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), "exec sleep 30".to_string()],
            stop_grace_secs: 5,
        };
        let watchdog = WatchdogConfig {
            max_restarts: 0,
            backoff_base_secs: 0,
            backoff_cap_secs: 0,
            quiet_reset_secs: 60,
        };
        let (mut app, mut rx, _player_rx, _dir) = test_app(player, watchdog, 50);

        app.want_playing = true;
        app.playing_index = Some(0);
        app.current_url = Some("http://example.com/stream".to_string());

        app.handle_message(AppMessage::Player(PlayerEvent::Died)).await;

        assert!(!app.want_playing);
        assert_eq!(app.playing_index, None);
        assert_eq!(app.current_url, None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn death_after_stop_is_ignored() {
        let player = PlayerConfig {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), "exec sleep 30".to_string()],
            stop_grace_secs: 5,
        };
        let (mut app, mut rx, _player_rx, _dir) = test_app(player, WatchdogConfig::default(), 50);

        // No session wanted — a stale death report must not schedule anything.
        app.handle_message(AppMessage::Player(PlayerEvent::Died)).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
        assert!(!app.want_playing);
    }

    #[tokio::test]
    async fn input_reader_exits_once_bus_is_gone() {
        let (tx, rx) = mpsc::channel::<AppMessage>(1);
        drop(rx);

        let handle = spawn_input_reader(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("reader stops without a final terminal event")
            .unwrap();
    }
}
