// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Power-spectrum detection pipeline
//!
//! The chain runs on one worker thread, in arrival order:
//! framer -> windowed FFT + PSD -> noise learner -> transmission tracker,
//! with the noise-subtracted PSD also feeding the spectrogram publisher.

pub mod framer;
pub mod noise;
pub mod pipeline;
pub mod spectral;
pub mod spectrogram;
pub mod tracker;

pub use framer::Framer;
pub use noise::NoiseLearner;
pub use pipeline::DspChain;
pub use spectral::SpectralStage;
pub use spectrogram::SpectrogramPublisher;
pub use tracker::TransmissionTracker;

use crate::radio::{Frequency, FrequencyRange};
use std::sync::{Arc, PoisonError, RwLock};

/// Maps FFT bin indices to frequencies relative to the current tuned centre
///
/// The tuned range moves between scans, so the mapper reads it through a
/// shared handle owned by the device. Bin `i` of an `n`-bin shifted spectrum
/// sits at `center + step * (i + 0.5) - sample_rate / 2`.
#[derive(Clone)]
pub struct BinMapper {
    sample_rate: Frequency,
    fft_size: usize,
    range: Arc<RwLock<FrequencyRange>>,
}

impl BinMapper {
    pub fn new(
        sample_rate: Frequency,
        fft_size: usize,
        range: Arc<RwLock<FrequencyRange>>,
    ) -> Self {
        Self {
            sample_rate,
            fft_size,
            range,
        }
    }

    /// Width of one FFT bin in Hz
    pub fn bin_step(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Signed offset of bin `index` from the tuned centre
    pub fn shift(&self, index: usize) -> Frequency {
        (self.bin_step() * (index as f64 + 0.5)) as Frequency - self.sample_rate / 2
    }

    /// Absolute frequency of bin `index`
    pub fn frequency(&self, index: usize) -> Frequency {
        self.center() + self.shift(index)
    }

    /// Currently tuned centre frequency; zero while retuning
    pub fn center(&self) -> Frequency {
        self.range()
            .center()
    }

    /// Currently tuned range
    pub fn range(&self) -> FrequencyRange {
        *self
            .range
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether bin `index` falls inside the tuned sub-range
    pub fn in_range(&self, index: usize) -> bool {
        self.range().contains(self.frequency(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(low: Frequency, high: Frequency, sample_rate: Frequency, n: usize) -> BinMapper {
        BinMapper::new(
            sample_rate,
            n,
            Arc::new(RwLock::new(FrequencyRange::new(low, high))),
        )
    }

    #[test]
    fn test_bin_to_shift_spans_the_window() {
        let m = mapper(0, 0, 8000, 8);
        assert_eq!(m.bin_step(), 1000.0);
        assert_eq!(m.shift(0), -3500);
        assert_eq!(m.shift(3), -500);
        assert_eq!(m.shift(4), 500);
        assert_eq!(m.shift(7), 3500);
    }

    #[test]
    fn test_bin_to_frequency_uses_center() {
        let m = mapper(144_000_000, 144_008_000, 8000, 8);
        assert_eq!(m.center(), 144_004_000);
        assert_eq!(m.frequency(0), 144_000_500);
        assert_eq!(m.frequency(7), 144_007_500);
        assert!(m.in_range(0));
        assert!(m.in_range(7));
    }

    #[test]
    fn test_out_of_subrange_bins_are_excluded() {
        // tuned window is 8 kHz wide but the configured range covers only
        // the upper half
        let m = mapper(144_004_000, 144_008_000, 8000, 8);
        // center is 144_006_000, so bin 0 sits at 144_002_500 and bin 7 at
        // 144_009_500, both outside the configured sub-range
        assert!(!m.in_range(0));
        assert!(!m.in_range(7));
        assert!(m.in_range(2));
        assert!(m.in_range(5));
    }
}
