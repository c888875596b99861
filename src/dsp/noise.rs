// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-bin noise-floor learning and subtraction
//!
//! Keeps an exponentially smoothed estimate of the ambient power in every
//! bin and publishes the PSD relative to it. Learning is gated by the
//! processing flag: while the scanner retunes, windows pass through
//! unchanged and the floor is left alone, so spectra from the old centre
//! never leak into the estimate for the new one.
//!
//! The floor vector is touched only on the DSP thread; the gate is the only
//! state shared with the scanner thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct NoiseLearner {
    /// Smoothing coefficient; the weight of the existing estimate
    alpha: f32,
    floor: Vec<f32>,
    processing: Arc<AtomicBool>,
}

impl NoiseLearner {
    /// `time_constant_secs` is the e-folding time of the estimate at
    /// `windows_per_second` detection windows per second.
    pub fn new(time_constant_secs: f32, windows_per_second: f32) -> Self {
        let alpha = (-1.0 / (time_constant_secs * windows_per_second)).exp();
        Self {
            alpha,
            floor: Vec::new(),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gate shared with the device; false makes `work` a pass-through
    pub fn processing_flag(&self) -> Arc<AtomicBool> {
        self.processing.clone()
    }

    /// Subtract the learned floor from one PSD window, updating the estimate
    pub fn work(&mut self, psd: Vec<f32>) -> Vec<f32> {
        if !self.processing.load(Ordering::Acquire) {
            return psd;
        }
        if self.floor.len() != psd.len() {
            // first window after startup seeds the estimate
            self.floor = psd.clone();
        }
        let mut out = psd;
        for (value, floor) in out.iter_mut().zip(self.floor.iter_mut()) {
            *floor = self.alpha * *floor + (1.0 - self.alpha) * *value;
            *value -= *floor;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_first_window_seeds_the_floor() {
        let mut learner = NoiseLearner::new(2.0, 10.0);
        learner.processing_flag().store(true, Ordering::Release);
        let out = learner.work(vec![-90.0, -85.0, -95.0]);
        // floor == psd, so the first output is flat at (almost) zero
        for value in out {
            assert!(value.abs() < 0.5);
        }
    }

    #[test]
    fn test_signal_stands_out_of_learned_floor() {
        let mut learner = NoiseLearner::new(2.0, 10.0);
        learner.processing_flag().store(true, Ordering::Release);
        for _ in 0..50 {
            learner.work(vec![-90.0, -90.0, -90.0]);
        }
        // a 20 dB burst on bin 1
        let out = learner.work(vec![-90.0, -70.0, -90.0]);
        assert!(out[0].abs() < 1.0);
        assert!(out[1] > 15.0);
        assert!(out[2].abs() < 1.0);
    }

    #[test]
    fn test_disabled_learner_passes_through() {
        let mut learner = NoiseLearner::new(2.0, 10.0);
        let input = vec![-90.0, -70.0];
        let out = learner.work(input.clone());
        assert_eq!(out, input);
        // and the floor was not seeded
        learner.processing_flag().store(true, Ordering::Release);
        let out = learner.work(vec![-50.0, -50.0]);
        assert!(out[0].abs() < 0.5);
    }
}
