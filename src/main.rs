mod app;
mod config;
mod error;
mod notify;
mod now_playing;
mod platform;
mod player;
mod stations;
mod system;
mod theme;
mod widgets;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::{App, AppMessage};
use crate::config::{Config, Preferences};
use crate::now_playing::Fetcher;
use crate::player::{PlayerEvent, PlayerSupervisor};
use crate::stations::StationRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("skyradio.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // The TUI owns the terminal, so logs go to a file. RUST_LOG overrides;
    // HTTP client internals are noisy at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,skyradio=debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("skyradio log: {}", log_path.display());
    info!("skyradio starting…");

    // ── Config + preferences ─────────────────────────────────────────────────
    let config = Config::load().unwrap_or_else(|e| {
        warn!("config: {}", e);
        Config::default()
    });

    let prefs_path = Preferences::path();
    let (prefs, prefs_warning) = match Preferences::load(&prefs_path) {
        Ok(prefs) => (prefs, None),
        Err(e) => {
            warn!("prefs: {}", e);
            (Preferences::default(), Some(e.to_string()))
        }
    };

    let registry = StationRegistry::load(&platform::config_dir().join("stations.toml"));
    info!("loaded {} stations", registry.len());

    // ── Event bus ────────────────────────────────────────────────────────────
    let (tx, rx) = mpsc::channel::<AppMessage>(256);

    // Watchdog events are forwarded onto the app bus so the main loop alone
    // decides about restarts.
    let (player_tx, mut player_rx) = mpsc::channel::<PlayerEvent>(16);
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(event) = player_rx.recv().await {
                if tx.send(AppMessage::Player(event)).await.is_err() {
                    break;
                }
            }
        });
    }
    let supervisor = PlayerSupervisor::new(config.player.clone(), player_tx);

    // ── Now-playing poller (runs regardless of playback state) ──────────────
    match Fetcher::new(&config.now_playing) {
        Ok(fetcher) => {
            now_playing::spawn_poller(fetcher, config.now_playing.poll_interval_secs, tx.clone())
        }
        Err(e) => warn!("now playing: poller disabled: {}", e),
    }

    // Seed the system output volume from the stored preference.
    if let Err(e) = system::set_system_volume(prefs.volume).await {
        warn!("volume: {}", e);
    }

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let mut app = App::new(config, prefs, prefs_path, registry, supervisor, tx);
    if let Some(reason) = prefs_warning {
        app.startup_warning(format!("using default preferences: {}", reason));
    }
    app.run(rx).await
}
