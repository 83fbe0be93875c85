//! Desktop notifications — fire-and-forget.

use tracing::debug;

/// Show a notification for freshly scraped now-playing text.
///
/// notify-rust blocks on the session bus, so this runs on a blocking task
/// and the outcome is logged and dropped.
pub fn notify_now_playing(summary: &str, body: &str) {
    let summary = summary.to_string();
    let body = body.to_string();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notify_rust::Notification::new()
            .summary(&summary)
            .body(&body)
            .icon("media-playback-start")
            .show()
        {
            debug!("notification failed: {}", e);
        }
    });
}
