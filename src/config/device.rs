// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Radio front-end configuration

use crate::radio::Frequency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration of the SDR front-end and its recorder pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// SoapySDR driver name (e.g. "rtlsdr", "hackrf"); "mock" selects the
    /// built-in synthetic source
    pub driver: String,

    /// Device serial number, used to pick one of several attached devices
    #[serde(default)]
    pub serial: String,

    /// Gain stages to apply at startup, by driver-specific element name
    #[serde(default)]
    pub gains: BTreeMap<String, f64>,

    /// Sample rate in Hz; also the widest observable bandwidth
    pub sample_rate: Frequency,

    /// Number of recorders created at startup
    #[serde(default = "default_recorders")]
    pub recorders: usize,

    /// Directory recorded clips and raw dumps are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Dump everything the source produces to a raw IQ file
    #[serde(default)]
    pub debug_save_full_raw_iq: bool,
}

fn default_recorders() -> usize {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl DeviceConfig {
    /// Identifier used in outbound topics, e.g. `rtlsdr_00000001`
    pub fn id(&self) -> String {
        format!("{}_{}", self.driver, self.serial)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            driver: "mock".to_string(),
            serial: String::new(),
            gains: BTreeMap::new(),
            sample_rate: 2_048_000,
            recorders: default_recorders(),
            output_dir: default_output_dir(),
            debug_save_full_raw_iq: false,
        }
    }
}
