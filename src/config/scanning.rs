// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Range cycling configuration

use crate::radio::FrequencyRange;
use serde::{Deserialize, Serialize};

/// Which spectrum to scan and how long to dwell on each range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanningConfig {
    /// Frequency ranges to cycle through; ranges wider than the sample rate
    /// are split into sample-rate-wide sub-ranges at startup
    #[serde(default)]
    pub scanned_ranges: Vec<FrequencyRange>,

    /// Transmissions inside these ranges are never opened
    #[serde(default)]
    pub ignored_ranges: Vec<FrequencyRange>,

    /// Dwell time per range when nothing is being recorded, in ms
    #[serde(default = "default_range_scan_time_ms")]
    pub range_scan_time_ms: u64,

    /// One-off settling delay after the very first tune, in ms
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_range_scan_time_ms() -> u64 {
    3000
}

fn default_initial_delay_ms() -> u64 {
    2000
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            scanned_ranges: Vec::new(),
            ignored_ranges: Vec::new(),
            range_scan_time_ms: default_range_scan_time_ms(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}
