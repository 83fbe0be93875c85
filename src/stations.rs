//! Station registry — a fixed name → stream-URL mapping.
//!
//! The builtin list covers the five Skyrock webradios. A `stations.toml`
//! next to the config file replaces it wholesale when present, using the
//! same `[[station]]` table shape as the config.

use std::path::Path;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub name: String,
    pub url: String,
}

pub fn builtin_stations() -> Vec<Station> {
    let list = [
        ("Skyrock", "https://icecast.skyrock.net/s/natio_mp3_128k"),
        (
            "Skyrock 100% Français",
            "https://icecast.skyrock.net/s/francais_aac_128k",
        ),
        (
            "Skyrock La Nocturne",
            "https://icecast.skyrock.net/s/nocturne_aac_128k",
        ),
        ("Skyrock PLM", "https://icecast.skyrock.net/s/plm_aac_128k"),
        (
            "Skyrock Hit US",
            "https://icecast.skyrock.net/s/hit_us_aac_128k",
        ),
    ];
    list.iter()
        .map(|(name, url)| Station {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect()
}

pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    /// Builtin list, unless an override file exists and parses.
    pub fn load(override_path: &Path) -> Self {
        if override_path.exists() {
            match load_stations_from_toml(override_path) {
                Ok(stations) if !stations.is_empty() => {
                    return Self { stations };
                }
                Ok(_) => warn!(
                    "stations: {} is empty, using builtin list",
                    override_path.display()
                ),
                Err(e) => warn!(
                    "stations: failed to parse {}: {}, using builtin list",
                    override_path.display(),
                    e
                ),
            }
        }
        Self {
            stations: builtin_stations(),
        }
    }

    pub fn from_stations(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.stations
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.url.as_str())
    }

    pub fn get(&self, idx: usize) -> Option<&Station> {
        self.stations.get(idx)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }
}

// ── TOML station loader ───────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    station: Vec<TomlStation>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlStation {
    name: String,
    url: String,
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file
        .station
        .into_iter()
        .map(|s| Station {
            name: s.name,
            url: s.url,
        })
        .collect())
}
