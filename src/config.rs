// ABOUTME: Runtime settings for changelog-reclaimer
// ABOUTME: Optional TOML file under ~/.changelog-reclaimer, overridden by CLI flags

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reclaim::{DaemonConfig, ReclaimConfig};

const APP_DIR: &str = ".changelog-reclaimer";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    reclaim: ReclaimSection,
    #[serde(default)]
    daemon: DaemonSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ReclaimSection {
    batch_size: Option<usize>,
    continuation_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DaemonSection {
    trigger_interval_secs: Option<u64>,
}

/// Effective settings after merging defaults, config file and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub reclaim: ReclaimConfig,
    pub trigger_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let daemon = DaemonConfig::default();
        Self {
            reclaim: daemon.reclaim,
            trigger_interval: daemon.trigger_interval,
        }
    }
}

/// Per-invocation overrides coming from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub batch_size: Option<usize>,
    pub continuation_delay_ms: Option<u64>,
    pub trigger_interval_secs: Option<u64>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load the file at `path` if given, else the default file if it exists,
    /// else built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {:?}", path);
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        let defaults = Self::default();
        let settings = Self {
            reclaim: ReclaimConfig {
                batch_size: file
                    .reclaim
                    .batch_size
                    .unwrap_or(defaults.reclaim.batch_size),
                continuation_delay: file
                    .reclaim
                    .continuation_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reclaim.continuation_delay),
            },
            trigger_interval: file
                .daemon
                .trigger_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.trigger_interval),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(batch_size) = overrides.batch_size {
            self.reclaim.batch_size = batch_size;
        }
        if let Some(delay_ms) = overrides.continuation_delay_ms {
            self.reclaim.continuation_delay = Duration::from_millis(delay_ms);
        }
        if let Some(secs) = overrides.trigger_interval_secs {
            self.trigger_interval = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            trigger_interval: self.trigger_interval,
            reclaim: self.reclaim,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reclaim.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.trigger_interval.is_zero() {
            bail!("trigger_interval_secs must be at least 1");
        }
        Ok(())
    }
}

/// `~/.changelog-reclaimer/config.toml`, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR).join("config.toml"))
}

/// `~/.changelog-reclaimer/sync.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(APP_DIR).join("sync.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reclaimer_constants() {
        let settings = Settings::default();
        assert_eq!(settings.reclaim.batch_size, 100);
        assert_eq!(settings.reclaim.continuation_delay, Duration::from_millis(500));
        assert_eq!(settings.trigger_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file() {
        let settings = Settings::from_toml_str(
            r#"
            [reclaim]
            continuation_delay_ms = 50

            [daemon]
            trigger_interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.reclaim.batch_size, 100);
        assert_eq!(settings.reclaim.continuation_delay, Duration::from_millis(50));
        assert_eq!(settings.trigger_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_zero_batch_and_unknown_keys() {
        assert!(Settings::from_toml_str("[reclaim]\nbatch_size = 0\n").is_err());
        assert!(Settings::from_toml_str("[reclaim]\nchunk = 10\n").is_err());
        assert!(Settings::from_toml_str("[daemon]\ntrigger_interval_secs = 0\n").is_err());
    }

    #[test]
    fn test_overrides_win_and_are_validated() {
        let settings = Settings::default()
            .with_overrides(Overrides {
                batch_size: Some(10),
                continuation_delay_ms: Some(0),
                trigger_interval_secs: None,
            })
            .unwrap();
        assert_eq!(settings.reclaim.batch_size, 10);
        assert_eq!(settings.reclaim.continuation_delay, Duration::ZERO);

        let err = Settings::default()
            .with_overrides(Overrides {
                batch_size: Some(0),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[reclaim]\nbatch_size = 25\n").unwrap();
        let settings = Settings::resolve(Some(&path)).unwrap();
        assert_eq!(settings.reclaim.batch_size, 25);

        let missing = dir.path().join("missing.toml");
        assert!(Settings::resolve(Some(&missing)).is_err());
    }
}
