//! Configuration loading
//!
//! Optional TOML config file at the platform config directory
//! (`~/.config/p3kit/config.toml` on Linux). Resolution priority for every
//! setting: command-line flag, then environment variable, then config file,
//! then built-in default. The file is optional; an explicitly named file
//! that cannot be read is an error.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output device name for playback (None = system default).
    pub output_device: Option<String>,

    /// Opus bitrate in bits/s for encoding (None = codec default).
    pub opus_bitrate: Option<i32>,

    /// Default loudness target in LUFS for encoding.
    pub target_lufs: Option<f64>,
}

impl Config {
    /// Load configuration.
    ///
    /// With `explicit` set, that file must exist and parse. Otherwise the
    /// default location is tried and a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (Self::default_path(), false),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            if required {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Platform default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("p3kit").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_default_config_yields_defaults() {
        // The default location may or may not exist on the test machine, so
        // exercise the explicit-path branch with a file that cannot exist.
        let result = Config::load(Some(Path::new("/nonexistent/p3kit.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "output_device = \"Speakers\"").unwrap();
        writeln!(file, "opus_bitrate = 24000").unwrap();
        writeln!(file, "target_lufs = -16.0").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output_device.as_deref(), Some("Speakers"));
        assert_eq!(config.opus_bitrate, Some(24_000));
        assert_eq!(config.target_lufs, Some(-16.0));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "opus_bitrate = 32000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.opus_bitrate, Some(32_000));
        assert!(config.output_device.is_none());
        assert!(config.target_lufs.is_none());
    }
}
