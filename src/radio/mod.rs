// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Radio domain types and the device layer
//!
//! This module defines the frequency types shared by the whole scanner, the
//! `SdrSource` abstraction over the hardware driver, the recorder pool and
//! the `SdrDevice` that owns the detection pipeline.

pub mod device;
pub mod mock;
pub mod notification;
pub mod recorder;
pub mod source;
pub mod utils;

pub use device::SdrDevice;
pub use notification::TransmissionNotification;
pub use recorder::Recorder;
pub use source::{open_source, SdrSource, SourceError};

use serde::{Deserialize, Serialize};

/// Frequency in integer hertz
///
/// Signed so that it can hold both absolute frequencies and signed shifts
/// relative to the tuned centre.
pub type Frequency = i64;

/// An ordered frequency range in hertz, `low <= high`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub low: Frequency,
    pub high: Frequency,
}

impl FrequencyRange {
    pub fn new(low: Frequency, high: Frequency) -> Self {
        Self { low, high }
    }

    /// Centre frequency the front-end is tuned to for this range
    pub fn center(&self) -> Frequency {
        (self.low + self.high) / 2
    }

    pub fn bandwidth(&self) -> Frequency {
        self.high - self.low
    }

    pub fn contains(&self, frequency: Frequency) -> bool {
        self.low <= frequency && frequency <= self.high
    }
}

/// A detected transmission as handed to the scheduler: the snapped shift from
/// the tuned centre, plus a request to commit buffered samples immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyFlush {
    /// Offset from the current tuned centre, snapped to the tuning step
    pub shift: Frequency,
    /// True when the transmission carried data in the current window
    pub flush: bool,
}

/// Render a frequency as dotted-decimal hertz, e.g. `144.800.000 Hz`
pub fn format_frequency(frequency: Frequency) -> String {
    let sign = if frequency < 0 { "-" } else { "" };
    let f = frequency.unsigned_abs();
    let f1 = f / 1_000_000;
    let f2 = (f / 1000) % 1000;
    let f3 = f % 1000;
    if f >= 1_000_000 {
        format!("{}{}.{:03}.{:03} Hz", sign, f1, f2, f3)
    } else if f >= 1000 {
        format!("{}{}.{:03} Hz", sign, f2, f3)
    } else {
        format!("{}{} Hz", sign, f3)
    }
}

/// Render a frequency range as `low - high`
pub fn format_frequency_range(range: &FrequencyRange) -> String {
    format!(
        "{} - {}",
        format_frequency(range.low),
        format_frequency(range.high)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_frequency(144_800_000), "144.800.000 Hz");
        assert_eq!(format_frequency(433_050), "433.050 Hz");
        assert_eq!(format_frequency(950), "950 Hz");
        assert_eq!(format_frequency(0), "0 Hz");
        assert_eq!(format_frequency(-12_500), "-12.500 Hz");
    }

    #[test]
    fn test_range_center_and_bandwidth() {
        let range = FrequencyRange::new(144_000_000, 146_000_000);
        assert_eq!(range.center(), 145_000_000);
        assert_eq!(range.bandwidth(), 2_000_000);
        assert!(range.contains(144_000_000));
        assert!(range.contains(146_000_000));
        assert!(!range.contains(146_000_001));
    }
}
