//! Job configuration and settings persistence

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Settings keys used in the persisted store
pub const KEY_FORMAT: &str = "format";
pub const KEY_CODEC: &str = "codec";
pub const KEY_BITRATE: &str = "bitrate";
pub const KEY_THUMBNAIL: &str = "thumbnail";

/// Per-job download configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    /// Format selector handed to the engine
    pub format: String,
    /// Target audio codec
    pub codec: String,
    /// Target bitrate in kbps
    pub bitrate: u32,
    /// Embed the source thumbnail as cover art
    pub embed_thumbnail: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            format: "best".to_string(),
            codec: "mp3".to_string(),
            bitrate: 192,
            embed_thumbnail: true,
        }
    }
}

impl JobConfig {
    /// Build a config from a flat settings map, falling back to defaults
    /// for missing or unusable entries. Out-of-range bitrates and unknown
    /// codec names are passed through untouched.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            format: read_string(map, KEY_FORMAT).unwrap_or(defaults.format),
            codec: read_string(map, KEY_CODEC).unwrap_or(defaults.codec),
            bitrate: read_u32(map, KEY_BITRATE).unwrap_or(defaults.bitrate),
            embed_thumbnail: read_bool(map, KEY_THUMBNAIL).unwrap_or(defaults.embed_thumbnail),
        }
    }

    /// Render this config as a flat settings map
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(KEY_FORMAT.to_string(), Value::String(self.format.clone()));
        map.insert(KEY_CODEC.to_string(), Value::String(self.codec.clone()));
        map.insert(KEY_BITRATE.to_string(), Value::from(self.bitrate));
        map.insert(KEY_THUMBNAIL.to_string(), Value::Bool(self.embed_thumbnail));
        map
    }
}

fn read_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_u32(map: &Map<String, Value>, key: &str) -> Option<u32> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn read_bool(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Coerce a raw textual setting into its typed form.
///
/// Strings that parse fully as integers become numbers, "true"/"false"
/// (any case) become booleans, everything else stays a string.
pub fn coerce_setting(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

/// Flat key-value settings store backed by a JSON file.
///
/// Unknown keys are preserved across load/save cycles so settings written
/// by newer versions survive a round trip.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the platform-default location
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "audiopipe", "audiopipe")
            .context("Failed to determine config directory")?;
        Ok(Self::new(proj_dirs.config_dir().join("settings.json")))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings map from disk.
    ///
    /// A missing file is populated with defaults; a malformed file is
    /// replaced by defaults in memory without touching the file.
    pub fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            let defaults = JobConfig::default().to_map();
            self.save(&defaults)?;
            info!("Created default settings at {:?}", self.path);
            return Ok(defaults);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {:?}", self.path))?;
        match serde_json::from_str::<Map<String, Value>>(&content) {
            Ok(map) => Ok(map),
            Err(err) => {
                warn!(
                    "Malformed settings file {:?} ({}), using defaults",
                    self.path, err
                );
                Ok(JobConfig::default().to_map())
            }
        }
    }

    /// Persist the settings map to disk
    pub fn save(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(&Value::Object(map.clone())).context("Failed to serialize settings")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", self.path))?;
        Ok(())
    }

    /// Load the effective job configuration
    pub fn load_config(&self) -> Result<JobConfig> {
        Ok(JobConfig::from_map(&self.load()?))
    }

    /// Update one setting from raw textual input, coercing it to its
    /// typed form before persisting
    pub fn set(&self, key: &str, raw: &str) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), coerce_setting(raw));
        self.save(&map)
    }

    /// Merge the given config into the store, keeping unknown keys
    pub fn save_config(&self, config: &JobConfig) -> Result<()> {
        let mut map = self.load()?;
        for (key, value) in config.to_map() {
            map.insert(key, value);
        }
        self.save(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = JobConfig::default();
        assert_eq!(config.format, "best");
        assert_eq!(config.codec, "mp3");
        assert_eq!(config.bitrate, 192);
        assert!(config.embed_thumbnail);
    }

    #[test]
    fn test_coerce_setting() {
        assert_eq!(coerce_setting("192"), Value::from(192));
        assert_eq!(coerce_setting("-5"), Value::from(-5));
        assert_eq!(coerce_setting("true"), Value::Bool(true));
        assert_eq!(coerce_setting("FALSE"), Value::Bool(false));
        assert_eq!(coerce_setting("mp3"), Value::String("mp3".to_string()));
        assert_eq!(coerce_setting("19.2"), Value::String("19.2".to_string()));
        assert_eq!(coerce_setting("192k"), Value::String("192k".to_string()));
    }

    #[test]
    fn test_from_map_coercion() {
        let mut map = Map::new();
        map.insert(KEY_BITRATE.to_string(), Value::String("320".to_string()));
        map.insert(KEY_THUMBNAIL.to_string(), Value::String("False".to_string()));
        let config = JobConfig::from_map(&map);
        assert_eq!(config.bitrate, 320);
        assert!(!config.embed_thumbnail);
        // missing keys fall back to defaults
        assert_eq!(config.format, "best");
        assert_eq!(config.codec, "mp3");
    }

    #[test]
    fn test_from_map_unusable_values_fall_back() {
        let mut map = Map::new();
        map.insert(KEY_BITRATE.to_string(), Value::String("fast".to_string()));
        map.insert(KEY_THUMBNAIL.to_string(), Value::from(1));
        let config = JobConfig::from_map(&map);
        assert_eq!(config.bitrate, 192);
        assert!(config.embed_thumbnail);
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("settings.json"));
        let map = store.load().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(JobConfig::from_map(&map), JobConfig::default());
        assert!(store.path().exists());
    }

    #[test]
    fn test_round_trip_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("settings.json"));

        let mut map = store.load().unwrap();
        map.insert("theme".to_string(), Value::String("dark".to_string()));
        store.save(&map).unwrap();

        let mut config = store.load_config().unwrap();
        config.bitrate = 320;
        store.save_config(&config).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.get("theme"), Some(&Value::String("dark".to_string())));
        assert_eq!(reloaded.get(KEY_BITRATE), Some(&Value::from(320)));
    }

    #[test]
    fn test_set_coerces_raw_input() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("settings.json"));

        store.set(KEY_BITRATE, "256").unwrap();
        store.set(KEY_THUMBNAIL, "FALSE").unwrap();
        store.set(KEY_CODEC, "opus").unwrap();

        let map = store.load().unwrap();
        assert_eq!(map.get(KEY_BITRATE), Some(&Value::from(256)));
        assert_eq!(map.get(KEY_THUMBNAIL), Some(&Value::Bool(false)));
        assert_eq!(map.get(KEY_CODEC), Some(&Value::String("opus".to_string())));

        let config = store.load_config().unwrap();
        assert_eq!(config.bitrate, 256);
        assert!(!config.embed_thumbnail);
        assert_eq!(config.codec, "opus");
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = ConfigStore::new(&path);
        let config = store.load_config().unwrap();
        assert_eq!(config, JobConfig::default());
    }
}
