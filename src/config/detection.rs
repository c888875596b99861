// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Detection pipeline configuration

use crate::radio::Frequency;
use serde::{Deserialize, Serialize};

/// Tuning of the power-spectrum detection chain
///
/// `max_bin_width` fixes the FFT size (smallest power of two whose bin width
/// is at or under the limit) and `target_fps` fixes the window decimation, so
/// between them they trade frequency resolution against CPU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Upper bound on the width of one FFT bin, in Hz
    #[serde(default = "default_max_bin_width")]
    pub max_bin_width: Frequency,

    /// Detection windows to process per second
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Noise-relative power a bin must reach to open a transmission, in dB
    #[serde(default = "default_start_threshold")]
    pub start_threshold: f32,

    /// Noise-relative power that keeps a transmission alive, in dB; must be
    /// below `start_threshold` to provide hysteresis
    #[serde(default = "default_stop_threshold")]
    pub stop_threshold: f32,

    /// A transmission is closed after this long below `stop_threshold`
    #[serde(default = "default_recording_timeout_ms")]
    pub recording_timeout_ms: u64,

    /// Bandwidth of one recorded transmission, in Hz; adjacent bins within
    /// this width are grouped into a single detection
    #[serde(default = "default_recording_bandwidth")]
    pub recording_bandwidth: Frequency,

    /// Granularity detected frequencies are snapped to, in Hz
    #[serde(default = "default_tuning_step")]
    pub tuning_step: Frequency,

    /// Time constant of the noise-floor estimator, in seconds
    #[serde(default = "default_noise_learning_time_secs")]
    pub noise_learning_time_secs: f32,
}

fn default_max_bin_width() -> Frequency {
    1000
}

fn default_target_fps() -> u32 {
    10
}

fn default_start_threshold() -> f32 {
    10.0
}

fn default_stop_threshold() -> f32 {
    5.0
}

fn default_recording_timeout_ms() -> u64 {
    2000
}

fn default_recording_bandwidth() -> Frequency {
    16_000
}

fn default_tuning_step() -> Frequency {
    2500
}

fn default_noise_learning_time_secs() -> f32 {
    2.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_bin_width: default_max_bin_width(),
            target_fps: default_target_fps(),
            start_threshold: default_start_threshold(),
            stop_threshold: default_stop_threshold(),
            recording_timeout_ms: default_recording_timeout_ms(),
            recording_bandwidth: default_recording_bandwidth(),
            tuning_step: default_tuning_step(),
            noise_learning_time_secs: default_noise_learning_time_secs(),
        }
    }
}

/// Spectrogram frame publication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Minimum width of one published spectrogram column, in Hz; the PSD is
    /// downsampled until its step is at least this wide
    #[serde(default = "default_min_step")]
    pub min_step: Frequency,

    /// Publish at most one frame per interval; excess frames are dropped
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
}

fn default_min_step() -> Frequency {
    1000
}

fn default_send_interval_ms() -> u64 {
    1000
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            min_step: default_min_step(),
            send_interval_ms: default_send_interval_ms(),
        }
    }
}
