// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! FFT-window framer with integer decimation
//!
//! Groups the sample stream into FFT-sized windows and keeps one window out
//! of every `decimation`, discarding the samples in between. This trades
//! time resolution for CPU without changing the bin width.

use num_complex::Complex32;

pub struct Framer {
    fft_size: usize,
    decimation: usize,
    window: Vec<Complex32>,
    /// Samples still to discard before the next window starts
    discard: usize,
}

impl Framer {
    /// `decimation` of 1 keeps every window
    pub fn new(fft_size: usize, decimation: usize) -> Self {
        Self {
            fft_size,
            decimation: decimation.max(1),
            window: Vec::with_capacity(fft_size),
            discard: 0,
        }
    }

    /// Decimation for a detection rate of `target_fps` windows per second
    ///
    /// Without decimation the chain produces `sample_rate / fft_size`
    /// windows per second (one bin step per window).
    pub fn decimation_for_fps(windows_per_second: f64, target_fps: u32) -> usize {
        ((windows_per_second / target_fps as f64) as usize).max(1)
    }

    /// Append samples, returning every completed window
    pub fn push(&mut self, samples: &[Complex32]) -> Vec<Vec<Complex32>> {
        let mut windows = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            if self.discard > 0 {
                let n = self.discard.min(rest.len());
                self.discard -= n;
                rest = &rest[n..];
                continue;
            }
            let n = (self.fft_size - self.window.len()).min(rest.len());
            self.window.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.window.len() == self.fft_size {
                windows.push(std::mem::replace(
                    &mut self.window,
                    Vec::with_capacity(self.fft_size),
                ));
                self.discard = (self.decimation - 1) * self.fft_size;
            }
        }
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, from: usize) -> Vec<Complex32> {
        (0..len)
            .map(|i| Complex32::new((from + i) as f32, 0.0))
            .collect()
    }

    #[test]
    fn test_windows_are_contiguous_blocks() {
        let mut framer = Framer::new(4, 1);
        let windows = framer.push(&ramp(10, 0));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0][0].re, 0.0);
        assert_eq!(windows[1][0].re, 4.0);
        // remaining two samples wait for the next call
        let windows = framer.push(&ramp(2, 10));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0][2].re, 10.0);
    }

    #[test]
    fn test_decimation_discards_between_windows() {
        let mut framer = Framer::new(4, 3);
        // 3 blocks of fft_size * decimation = 12 samples each
        let windows = framer.push(&ramp(36, 0));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0][0].re, 0.0);
        assert_eq!(windows[1][0].re, 12.0);
        assert_eq!(windows[2][0].re, 24.0);
    }

    #[test]
    fn test_decimation_for_fps() {
        assert_eq!(Framer::decimation_for_fps(1000.0, 10), 100);
        assert_eq!(Framer::decimation_for_fps(5.0, 10), 1);
    }
}
