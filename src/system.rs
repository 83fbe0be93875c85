//! Shell-outs for system volume and cue sounds. All best-effort.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Percentage argument passed to pactl, e.g. "73%".
pub fn volume_arg(pct: u8) -> String {
    format!("{}%", pct.min(100))
}

/// Set the default sink's volume. Failure is surfaced to the caller but is
/// never fatal.
pub async fn set_system_volume(pct: u8) -> anyhow::Result<()> {
    let status = Command::new("pactl")
        .args(["set-sink-volume", "@DEFAULT_SINK@", &volume_arg(pct)])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        anyhow::bail!("pactl exited with {}", status);
    }
    Ok(())
}

/// Play a short cue sound if the file exists. A missing file is a silent
/// no-op; a spawn failure is logged and discarded.
pub fn play_cue(path: &Path) {
    if !path.exists() {
        return;
    }
    match Command::new("aplay")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => debug!("cue: playing {}", path.display()),
        Err(e) => warn!("cue: failed to play {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_arg_formats_bounds() {
        assert_eq!(volume_arg(0), "0%");
        assert_eq!(volume_arg(100), "100%");
        assert_eq!(volume_arg(73), "73%");
        // Out-of-range input is clamped rather than passed through.
        assert_eq!(volume_arg(250), "100%");
    }

    #[test]
    fn missing_cue_is_a_no_op() {
        play_cue(Path::new("/nonexistent/cue.wav"));
    }
}
