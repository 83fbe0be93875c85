//! Error taxonomy.
//!
//! Every variant here is caught at the boundary where it occurs and turned
//! into a toast or a log line; none of them crash the application.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The external player binary could not be spawned.
    #[error("could not launch `{binary}`: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Graceful termination failed or timed out before the forced kill.
    #[error("could not stop player: {0}")]
    Stop(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("now-playing request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured CSS selector does not parse.
    #[error("invalid now-playing selector `{0}`")]
    Selector(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("could not write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}
