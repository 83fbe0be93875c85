//! Playback supervisor — owns the external player process and its watchdog.
//!
//! Lifecycle: `Idle → Starting → Playing → Stopping → Idle`, with an
//! unexpected death in `Playing` reported to the main loop, which alone
//! decides whether to relaunch (see `RestartPolicy`).
//!
//! Sharing model: the child handle lives in an `Arc<Mutex<Option<Child>>>`
//! polled by the watchdog task; `stop_requested` is an `AtomicBool` set by
//! `stop()` *before* any signal is sent, so the watchdog can never race a
//! restart against an intentional stop. The watchdog never mutates app
//! state itself — it sends one `PlayerEvent::Died` and exits.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{PlayerConfig, WatchdogConfig};
use crate::error::PlayerError;

const WATCHDOG_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Starting,
    Playing,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The child exited while no stop was requested.
    Died,
}

pub struct PlayerSupervisor {
    config: PlayerConfig,
    child: Arc<Mutex<Option<Child>>>,
    stop_requested: Arc<AtomicBool>,
    state: PlayerState,
    event_tx: mpsc::Sender<PlayerEvent>,
}

impl PlayerSupervisor {
    pub fn new(config: PlayerConfig, event_tx: mpsc::Sender<PlayerEvent>) -> Self {
        Self {
            config,
            child: Arc::new(Mutex::new(None)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            state: PlayerState::Idle,
            event_tx,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Invariant: playing exactly when a child handle is held.
    pub async fn is_playing(&self) -> bool {
        self.child.lock().await.is_some()
    }

    /// Launch the player for `url` and start a fresh watchdog.
    ///
    /// A no-op when a session already exists. On spawn failure the state
    /// stays `Idle`.
    pub async fn start(&mut self, url: &str, volume: u8) -> Result<(), PlayerError> {
        if self.child.lock().await.is_some() {
            debug!("player: start ignored, session already active");
            return Ok(());
        }

        self.state = PlayerState::Starting;
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&self.config.args)
            .arg("--volume")
            .arg(volume.to_string())
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = PlayerState::Idle;
                return Err(PlayerError::Launch {
                    binary: self.config.binary.clone(),
                    source,
                });
            }
        };
        info!("player: spawned {} for {}", self.config.binary, url);

        self.stop_requested.store(false, Ordering::SeqCst);
        *self.child.lock().await = Some(child);
        self.state = PlayerState::Playing;

        spawn_watchdog(
            self.child.clone(),
            self.stop_requested.clone(),
            self.event_tx.clone(),
        );
        Ok(())
    }

    /// Graceful stop: flag first, then signal, bounded wait, forced kill.
    ///
    /// The handle is cleared and the state returns to `Idle` regardless of
    /// how termination went — a failed kill must not leave a phantom
    /// "playing" session.
    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.state = PlayerState::Stopping;

        let child = self.child.lock().await.take();
        let result = match child {
            Some(child) => {
                shutdown_child(child, Duration::from_secs(self.config.stop_grace_secs)).await
            }
            None => Ok(()),
        };

        self.state = PlayerState::Idle;
        result
    }
}

async fn shutdown_child(mut child: Child, grace: Duration) -> Result<(), PlayerError> {
    terminate(&child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("player: exited with {}", status);
            Ok(())
        }
        Ok(Err(e)) => {
            let _ = child.kill().await;
            Err(PlayerError::Stop(format!("wait failed: {}", e)))
        }
        Err(_) => {
            warn!("player: no exit within {:?}, killing", grace);
            child
                .kill()
                .await
                .map_err(|e| PlayerError::Stop(format!("kill failed: {}", e)))
        }
    }
}

/// Best-effort SIGTERM so the player can tear down its stream cleanly.
#[cfg(unix)]
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

// ── watchdog ──────────────────────────────────────────────────────────────────

/// One task per session. Polls liveness every second; on unexpected death it
/// clears the handle, sends a single `Died`, and exits. An intentional stop
/// (flag set, or handle already taken) ends the loop silently.
fn spawn_watchdog(
    child: Arc<Mutex<Option<Child>>>,
    stop_requested: Arc<AtomicBool>,
    event_tx: mpsc::Sender<PlayerEvent>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WATCHDOG_POLL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if stop_requested.load(Ordering::SeqCst) {
                debug!("watchdog: stop requested, exiting");
                return;
            }

            let exited = {
                let mut guard = child.lock().await;
                match guard.as_mut() {
                    // Session already torn down under us.
                    None => return,
                    Some(c) => match c.try_wait() {
                        Ok(Some(status)) => {
                            warn!("watchdog: player exited unexpectedly: {}", status);
                            guard.take();
                            true
                        }
                        Ok(None) => false,
                        Err(e) => {
                            warn!("watchdog: liveness check failed: {}", e);
                            false
                        }
                    },
                }
            };

            if exited {
                // A stop may have landed while we held the lock.
                if !stop_requested.load(Ordering::SeqCst) {
                    let _ = event_tx.send(PlayerEvent::Died).await;
                }
                return;
            }
        }
    });
}

// ── restart policy ────────────────────────────────────────────────────────────

/// Exponential backoff with a consecutive-restart ceiling.
///
/// The old behaviour was an unbounded relaunch-on-crash loop; this keeps the
/// relaunch-per-death semantics but caps how long a permanently dead stream
/// is hammered. A session that stays up past the quiet period resets the
/// counter.
#[derive(Debug)]
pub struct RestartPolicy {
    max_restarts: u32,
    base: Duration,
    cap: Duration,
    quiet: Duration,
    consecutive: u32,
    last_start: Option<Instant>,
}

impl RestartPolicy {
    pub fn new(cfg: &WatchdogConfig) -> Self {
        Self {
            max_restarts: cfg.max_restarts,
            base: Duration::from_secs(cfg.backoff_base_secs),
            cap: Duration::from_secs(cfg.backoff_cap_secs),
            quiet: Duration::from_secs(cfg.quiet_reset_secs),
            consecutive: 0,
            last_start: None,
        }
    }

    /// Record a (re)launch attempt, for the quiet-period reset.
    pub fn record_start(&mut self) {
        self.last_start = Some(Instant::now());
    }

    /// Manual start/stop clears the history.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.last_start = None;
    }

    /// Decide how to react to an unexpected death: `Some(delay)` before the
    /// next launch, or `None` once the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(started) = self.last_start {
            if started.elapsed() >= self.quiet {
                self.consecutive = 0;
            }
        }
        if self.consecutive >= self.max_restarts {
            return None;
        }
        let delay = (self.base * 2u32.saturating_pow(self.consecutive)).min(self.cap);
        self.consecutive += 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchdogConfig;

    fn sh_player(script: &str, grace_secs: u64) -> PlayerConfig {
        // The trailing positional args (--volume N url) land in $0/$1/$2 of
        // the -c script and are ignored.
        PlayerConfig {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            stop_grace_secs: grace_secs,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_then_stop_returns_to_idle() {
        let (tx, _rx) = mpsc::channel(8);
        let mut sup = PlayerSupervisor::new(sh_player("exec sleep 30", 5), tx);

        sup.start("http://example.com/stream", 50).await.unwrap();
        assert!(sup.is_playing().await);
        assert_eq!(sup.state(), PlayerState::Playing);

        sup.stop().await.unwrap();
        assert!(!sup.is_playing().await);
        assert_eq!(sup.state(), PlayerState::Idle);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_force_kills_a_child_that_ignores_sigterm() {
        let (tx, _rx) = mpsc::channel(8);
        let mut sup = PlayerSupervisor::new(sh_player("trap '' TERM; sleep 30", 1), tx);

        sup.start("http://example.com/stream", 50).await.unwrap();
        assert!(sup.is_playing().await);

        // Grace is 1s; the child ignores TERM, so this goes through the
        // forced-kill path and must still land in Idle with no handle.
        sup.stop().await.unwrap();
        assert!(!sup.is_playing().await);
        assert_eq!(sup.state(), PlayerState::Idle);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unexpected_death_sends_exactly_one_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sup = PlayerSupervisor::new(sh_player("exit 0", 5), tx);

        sup.start("http://example.com/stream", 50).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watchdog reports death within its poll interval")
            .expect("channel open");
        assert_eq!(event, PlayerEvent::Died);

        // The watchdog loop terminates after one report.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(rx.try_recv().is_err());
        assert!(!sup.is_playing().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_before_death_suppresses_restart_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sup = PlayerSupervisor::new(sh_player("exec sleep 30", 5), tx);

        sup.start("http://example.com/stream", 50).await.unwrap();
        sup.stop().await.unwrap();

        // Give the watchdog a couple of ticks to notice; it must exit
        // silently because the stop flag was set before the signal.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_failure_keeps_idle() {
        let (tx, _rx) = mpsc::channel(8);
        let mut sup = PlayerSupervisor::new(
            PlayerConfig {
                binary: "/nonexistent/definitely-not-a-player".to_string(),
                args: vec![],
                stop_grace_secs: 5,
            },
            tx,
        );

        let err = sup.start("http://example.com/stream", 50).await.unwrap_err();
        assert!(matches!(err, PlayerError::Launch { .. }));
        assert_eq!(sup.state(), PlayerState::Idle);
        assert!(!sup.is_playing().await);
    }

    #[test]
    fn restart_policy_backs_off_and_gives_up() {
        let cfg = WatchdogConfig {
            max_restarts: 3,
            backoff_base_secs: 1,
            backoff_cap_secs: 3,
            quiet_reset_secs: 60,
        };
        let mut policy = RestartPolicy::new(&cfg);

        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
        // 4s capped to 3s.
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_delay(), None);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }
}
