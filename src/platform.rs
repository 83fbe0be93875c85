use std::path::PathBuf;

pub fn config_dir() -> PathBuf {
    // On macOS and Linux, always use ~/.config/skyradio/
    // (avoid macOS Application Support folder for consistency)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("skyradio")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyradio")
    }
}

pub fn data_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| std::env::temp_dir())
            .join(".local")
            .join("share")
            .join("skyradio")
    }

    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyradio")
    }
}
