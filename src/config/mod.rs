// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scanner configuration
//!
//! YAML-backed configuration with startup validation. A missing file is
//! replaced by a default one so the user has something to edit.

mod detection;
mod device;
mod scanning;

pub use detection::{DetectionConfig, SpectrogramConfig};
pub use device::DeviceConfig;
pub use scanning::ScanningConfig;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration for one scanner process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Radio front-end settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// Detection pipeline settings
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Spectrogram publication settings
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    /// Range cycling settings
    #[serde(default)]
    pub scanning: ScanningConfig,
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// If the file does not exist a default configuration is written there
    /// and returned, so a first run leaves an editable template behind.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        let config: Config = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        if let Err(err) = config.validate() {
            error!("Configuration validation error: {}", err);
            return Err(err);
        }
        Ok(config)
    }

    /// Save the configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Validate rules that the type system cannot express
    ///
    /// All violations here are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.device.sample_rate <= 0 {
            anyhow::bail!("device.sample_rate must be positive");
        }
        if self.device.recorders == 0 {
            anyhow::bail!("device.recorders must be at least 1");
        }
        if self.detection.max_bin_width <= 0 {
            anyhow::bail!("detection.max_bin_width must be positive");
        }
        if self.detection.target_fps == 0 {
            anyhow::bail!("detection.target_fps must be positive");
        }
        if self.detection.stop_threshold >= self.detection.start_threshold {
            anyhow::bail!(
                "detection.start_threshold ({} dB) must exceed detection.stop_threshold ({} dB)",
                self.detection.start_threshold,
                self.detection.stop_threshold
            );
        }
        if self.detection.tuning_step <= 0 {
            anyhow::bail!("detection.tuning_step must be positive");
        }
        if self.detection.recording_bandwidth <= 0 {
            anyhow::bail!("detection.recording_bandwidth must be positive");
        }
        if self.spectrogram.min_step <= 0 {
            anyhow::bail!("spectrogram.min_step must be positive");
        }
        if self.scanning.range_scan_time_ms == 0 {
            anyhow::bail!("scanning.range_scan_time_ms must be positive");
        }
        for range in self
            .scanning
            .scanned_ranges
            .iter()
            .chain(self.scanning.ignored_ranges.iter())
        {
            if range.high < range.low {
                anyhow::bail!(
                    "invalid frequency range: {} - {}",
                    range.low,
                    range.high
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::FrequencyRange;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = Config::default();
        config.scanning.scanned_ranges = vec![FrequencyRange::new(144_000_000, 146_000_000)];
        let yaml = serde_yml::to_string(&config).unwrap();
        let parsed: Config = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed.scanning.scanned_ranges, config.scanning.scanned_ranges);
        assert_eq!(parsed.device.sample_rate, config.device.sample_rate);
    }

    #[test]
    fn test_thresholds_must_leave_hysteresis() {
        let mut config = Config::default();
        config.detection.start_threshold = 5.0;
        config.detection.stop_threshold = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut config = Config::default();
        config.scanning.scanned_ranges = vec![FrequencyRange::new(146_000_000, 144_000_000)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config::from_file(&path).unwrap();
        assert!(path.exists());
        config.validate().unwrap();
    }
}
