// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Synthetic IQ source
//!
//! Generates a set of continuous carriers at fixed offsets from the tuned
//! centre and paces reads at the configured sample rate, so the whole
//! scanner can run without hardware attached.

use super::source::{SdrSource, SourceError};
use super::Frequency;
use num_complex::Complex32;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct MockCarrier {
    /// Offset from the tuned centre in Hz
    pub offset: Frequency,
    pub amplitude: f32,
}

pub struct MockSource {
    sample_rate: Frequency,
    carriers: Vec<MockCarrier>,
    sample_index: u64,
    tuned: Arc<Mutex<Vec<Frequency>>>,
}

impl MockSource {
    pub fn new(sample_rate: Frequency) -> Self {
        // one carrier an eighth of the window above centre
        Self::with_carriers(
            sample_rate,
            vec![MockCarrier {
                offset: sample_rate / 8,
                amplitude: 0.5,
            }],
        )
    }

    pub fn with_carriers(sample_rate: Frequency, carriers: Vec<MockCarrier>) -> Self {
        Self {
            sample_rate,
            carriers,
            sample_index: 0,
            tuned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every frequency the scanner tuned to, in order
    pub fn tuned_log(&self) -> Arc<Mutex<Vec<Frequency>>> {
        self.tuned.clone()
    }
}

impl SdrSource for MockSource {
    fn set_gain(&mut self, _name: &str, _value: f64) -> Result<(), SourceError> {
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: Frequency) -> Result<(), SourceError> {
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn set_frequency(&mut self, frequency: Frequency) -> Result<(), SourceError> {
        self.tuned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frequency);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [Complex32]) -> Result<usize, SourceError> {
        for sample in buffer.iter_mut() {
            let mut value = Complex32::new(0.0, 0.0);
            for carrier in &self.carriers {
                let turns = carrier.offset as f64 * self.sample_index as f64
                    / self.sample_rate as f64;
                let phase = (2.0 * std::f64::consts::PI * turns.fract()) as f32;
                value += Complex32::new(phase.cos(), phase.sin()) * carrier.amplitude;
            }
            *sample = value;
            self.sample_index = self.sample_index.wrapping_add(1);
        }
        // pace like real hardware would
        thread::sleep(Duration::from_secs_f64(
            buffer.len() as f64 / self.sample_rate as f64,
        ));
        Ok(buffer.len())
    }
}
