// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The assembled detection chain
//!
//! Owned by the DSP worker thread. Windows flow framer -> spectral -> noise
//! learner, then the noise-subtracted PSD fans out to the transmission
//! tracker and the spectrogram publisher.

use super::{Framer, NoiseLearner, SpectralStage, SpectrogramPublisher, TransmissionTracker};
use num_complex::Complex32;
use std::sync::Arc;
use std::time::Instant;

pub struct DspChain {
    framer: Framer,
    spectral: SpectralStage,
    noise: NoiseLearner,
    tracker: Arc<TransmissionTracker>,
    spectrogram: SpectrogramPublisher,
}

impl DspChain {
    pub fn new(
        framer: Framer,
        spectral: SpectralStage,
        noise: NoiseLearner,
        tracker: Arc<TransmissionTracker>,
        spectrogram: SpectrogramPublisher,
    ) -> Self {
        Self {
            framer,
            spectral,
            noise,
            tracker,
            spectrogram,
        }
    }

    /// Feed raw samples; windows complete in arrival order
    pub fn work(&mut self, samples: &[Complex32]) {
        for window in self.framer.push(samples) {
            let psd = self.spectral.process(&window);
            let subtracted = self.noise.work(psd);
            let now = Instant::now();
            self.tracker.work(&subtracted, now);
            self.spectrogram.work(&subtracted, now);
        }
    }
}
