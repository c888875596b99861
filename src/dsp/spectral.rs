// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Windowed FFT and power-spectral-density conversion
//!
//! Each window is multiplied by a Hamming window, transformed by a forward
//! FFT and converted to dBFS. The output is rearranged so that bin 0 is the
//! lowest frequency of the observed window (`center - sample_rate / 2`).

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Floor for the squared magnitude, keeps log10 away from zero
const POWER_EPSILON: f32 = 1e-20;

pub struct SpectralStage {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex32>,
    buffer: Vec<Complex32>,
    reference_db: f32,
}

impl SpectralStage {
    pub fn new(fft_size: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = hamming(fft_size);
        Self {
            fft,
            window,
            scratch,
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
            reference_db: 10.0 * (fft_size as f32).log10(),
        }
    }

    /// Transform one window of IQ samples into a dBFS power spectrum
    ///
    /// `samples` must be exactly `fft_size` long.
    pub fn process(&mut self, samples: &[Complex32]) -> Vec<f32> {
        debug_assert_eq!(samples.len(), self.window.len());
        for (out, (sample, coefficient)) in self
            .buffer
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *out = *sample * *coefficient;
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let n = self.buffer.len();
        let mut psd = Vec::with_capacity(n);
        for i in 0..n {
            // shift so that negative frequencies come first
            let x = self.buffer[(i + n / 2) % n];
            let power = x.norm_sqr() / n as f32 + POWER_EPSILON;
            psd.push(10.0 * power.log10() - self.reference_db);
        }
        psd
    }
}

fn hamming(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos()
        })
        .collect()
}
