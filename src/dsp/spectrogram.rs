// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Spectrogram frame publication
//!
//! Downsamples each noise-subtracted PSD window until the column width
//! reaches the configured minimum, quantises to int8 and publishes at most
//! one frame per send interval. Excess frames are dropped, not queued.

use super::BinMapper;
use crate::publish::{DataPublisher, SpectrogramFrame};
use crate::radio::Frequency;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct SpectrogramPublisher {
    mapper: BinMapper,
    sample_rate: Frequency,
    /// Adjacent bins averaged into one output column
    factor: usize,
    interval: Duration,
    last_send: Option<Instant>,
    publisher: DataPublisher,
}

impl SpectrogramPublisher {
    pub fn new(
        mapper: BinMapper,
        sample_rate: Frequency,
        factor: usize,
        interval: Duration,
        publisher: DataPublisher,
    ) -> Self {
        Self {
            mapper,
            sample_rate,
            factor: factor.max(1),
            interval,
            last_send: None,
            publisher,
        }
    }

    pub fn work(&mut self, psd: &[f32], now: Instant) {
        if let Some(last) = self.last_send {
            if now.duration_since(last) < self.interval {
                return;
            }
        }
        let frequency = self.mapper.center();
        if frequency == 0 {
            return;
        }
        self.last_send = Some(now);

        let powers: Vec<i8> = psd
            .chunks(self.factor)
            .map(|chunk| {
                let mean = chunk.iter().sum::<f32>() / chunk.len() as f32;
                mean.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
            })
            .collect();

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.publisher.push_spectrogram(SpectrogramFrame {
            timestamp_ms,
            frequency,
            sample_rate: self.sample_rate,
            powers,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{DataController, MessageSink};
    use crate::radio::FrequencyRange;
    use anyhow::Result;
    use std::sync::{Arc, Mutex, RwLock};

    #[derive(Default)]
    struct CountingSink {
        frames: Mutex<Vec<serde_json::Value>>,
    }

    impl MessageSink for CountingSink {
        fn publish(&self, _topic: &str, payload: &[u8]) -> Result<()> {
            self.frames
                .lock()
                .unwrap()
                .push(serde_json::from_slice(payload)?);
            Ok(())
        }
    }

    fn publisher_under_test(
        sink: Arc<CountingSink>,
        interval_ms: u64,
    ) -> (SpectrogramPublisher, DataController) {
        let controller = DataController::new(sink, "test_device".to_string());
        let range = Arc::new(RwLock::new(FrequencyRange::new(100_000, 108_000)));
        let mapper = BinMapper::new(8000, 8, range);
        let publisher = SpectrogramPublisher::new(
            mapper,
            8000,
            2,
            Duration::from_millis(interval_ms),
            controller.publisher(),
        );
        (publisher, controller)
    }

    #[test]
    fn test_downsample_and_quantise() {
        let sink = Arc::new(CountingSink::default());
        let (mut publisher, mut controller) = publisher_under_test(sink.clone(), 1000);

        publisher.work(
            &[0.4, 0.6, -10.0, -11.0, 60.0, 70.0, -200.0, -200.0],
            Instant::now(),
        );
        controller.stop();

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let powers = frames[0]["powers"].as_array().unwrap();
        // pairwise means: 0.5, -10.5, 65, -200 (clamped)
        assert_eq!(powers.len(), 4);
        assert_eq!(powers[0], 1); // round() goes half away from zero
        assert_eq!(powers[1], -11);
        assert_eq!(powers[2], 65);
        assert_eq!(powers[3], -128);
        assert_eq!(frames[0]["frequency"], 104_000);
    }

    #[test]
    fn test_excess_frames_are_dropped() {
        let sink = Arc::new(CountingSink::default());
        let (mut publisher, mut controller) = publisher_under_test(sink.clone(), 1000);

        let t0 = Instant::now();
        publisher.work(&[0.0; 8], t0);
        publisher.work(&[0.0; 8], t0 + Duration::from_millis(10));
        publisher.work(&[0.0; 8], t0 + Duration::from_millis(999));
        publisher.work(&[0.0; 8], t0 + Duration::from_millis(1001));
        controller.stop();

        assert_eq!(sink.frames.lock().unwrap().len(), 2);
    }
}
