//! Now-playing fetcher — scrapes the station page for the current track.
//!
//! Best-effort polling with no retry beyond the next scheduled tick. A
//! failed fetch leaves the displayed text stale; it never kills the loop.

use std::time::Duration;

use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tracing::debug;

use crate::app::AppMessage;
use crate::config::NowPlayingConfig;
use crate::error::FetchError;

/// Text shown until the first successful fetch.
pub const UNKNOWN_TRACK: &str = "unknown";

/// Extract the trimmed text of the first element matching `selector`.
///
/// Missing node and empty text both come back as `Ok(None)` — the page
/// loaded, it just didn't carry the fragment we wanted.
pub fn extract_now_playing(html: &str, selector: &str) -> Result<Option<String>, FetchError> {
    let sel =
        Selector::parse(selector).map_err(|_| FetchError::Selector(selector.to_string()))?;
    let document = Html::parse_document(html);

    for element in document.select(&sel) {
        let text = element.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

pub struct Fetcher {
    client: reqwest::Client,
    page_url: String,
    selector: String,
}

impl Fetcher {
    pub fn new(cfg: &NowPlayingConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            page_url: cfg.page_url.clone(),
            selector: cfg.selector.clone(),
        })
    }

    pub async fn fetch(&self) -> Result<Option<String>, FetchError> {
        let body = self
            .client
            .get(&self.page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract_now_playing(&body, &self.selector)
    }
}

/// Poll on a fixed interval regardless of playback state, funnelling every
/// outcome (success or failure) into the main loop.
pub fn spawn_poller(fetcher: Fetcher, interval_secs: u64, tx: mpsc::Sender<AppMessage>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick so startup doesn't race the UI.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let outcome = fetcher.fetch().await;
            if tx.send(AppMessage::NowPlaying(outcome)).await.is_err() {
                debug!("now-playing poller: app gone, exiting");
                return;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="header">Skyrock</div>
          <div class="now-playing">  PNL - Au DD  </div>
          <div class="footer">mentions légales</div>
        </body></html>
    "#;

    #[test]
    fn extracts_trimmed_text() {
        let text = extract_now_playing(PAGE, "div.now-playing").unwrap();
        assert_eq!(text.as_deref(), Some("PNL - Au DD"));
    }

    #[test]
    fn missing_node_is_none() {
        let text = extract_now_playing(PAGE, "div.does-not-exist").unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn empty_node_is_none() {
        let html = r#"<div class="now-playing">   </div>"#;
        let text = extract_now_playing(html, "div.now-playing").unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn malformed_markup_does_not_error() {
        // html5ever recovers from tag soup; worst case is a missing node.
        let html = "<div class=now-playing><b>Track</div></b><<<";
        let text = extract_now_playing(html, "div.now-playing").unwrap();
        assert_eq!(text.as_deref(), Some("Track"));
    }

    #[test]
    fn bad_selector_is_an_error() {
        let err = extract_now_playing(PAGE, ":::not a selector").unwrap_err();
        assert!(matches!(err, FetchError::Selector(_)));
    }
}
