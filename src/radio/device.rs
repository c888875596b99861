// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The SDR device
//!
//! Owns the source, the detection chain's worker thread, the recorder pool
//! and the ignored-shifts set. The scanner thread drives it through
//! `set_frequency_range` and `update_recordings`; everything else happens on
//! the DSP and recorder threads.

use super::notification::TransmissionNotification;
use super::recorder::{Recorder, RecorderFeed};
use super::source::SdrSource;
use super::utils::{clip_file_name, decimation_factor, fft_size};
use super::{format_frequency, format_frequency_range, Frequency, FrequencyFlush, FrequencyRange};
use crate::config::Config;
use crate::dsp::{
    BinMapper, DspChain, Framer, NoiseLearner, SpectralStage, SpectrogramPublisher,
    TransmissionTracker,
};
use crate::dsp::tracker::TrackerParams;
use crate::publish::DataPublisher;
use anyhow::{Context, Result};
use log::{info, warn};
use num_complex::Complex32;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const LABEL: &str = "sdr";
const TUNE_ATTEMPTS: usize = 10;

pub struct SdrDevice {
    sample_rate: Frequency,
    initial_delay: Duration,
    debug_save_raw_iq: bool,
    output_dir: PathBuf,
    is_initialized: bool,
    frequency_range: Arc<RwLock<FrequencyRange>>,
    source: Arc<Mutex<Box<dyn SdrSource>>>,
    tracker: Arc<TransmissionTracker>,
    noise_processing: Arc<AtomicBool>,
    raw_sink: Arc<Mutex<RawFileSink>>,
    recorders: Vec<Recorder>,
    ignored_shifts: HashSet<Frequency>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SdrDevice {
    pub fn new(
        config: &Config,
        mut source: Box<dyn SdrSource>,
        notification: Arc<TransmissionNotification>,
        publisher: DataPublisher,
    ) -> Result<Self> {
        let sample_rate = config.device.sample_rate;
        let n = fft_size(sample_rate, config.detection.max_bin_width);
        let bin_step = sample_rate as f64 / n as f64;
        let decimation = Framer::decimation_for_fps(bin_step, config.detection.target_fps);
        let windows_per_second = bin_step / decimation as f64;
        let group_size = (config.detection.recording_bandwidth as f64 / bin_step).ceil() as usize;

        info!(target: LABEL, "starting");
        info!(
            target: LABEL,
            "driver: {}, serial: {}, sample rate: {}, fft size: {}, bin step: {:.1} Hz, tuning step: {}, recorders: {}",
            config.device.driver,
            config.device.serial,
            format_frequency(sample_rate),
            n,
            bin_step,
            format_frequency(config.detection.tuning_step),
            config.device.recorders
        );

        for (name, value) in &config.device.gains {
            info!(target: LABEL, "set gain, {}: {:.1} dB", name, value);
            source
                .set_gain(name, *value)
                .with_context(|| format!("failed to set gain {}", name))?;
        }
        source
            .set_sample_rate(sample_rate)
            .context("failed to set sample rate")?;

        let frequency_range = Arc::new(RwLock::new(FrequencyRange::new(0, 0)));
        let mapper = BinMapper::new(sample_rate, n, frequency_range.clone());

        let noise = NoiseLearner::new(
            config.detection.noise_learning_time_secs,
            windows_per_second as f32,
        );
        let noise_processing = noise.processing_flag();
        let tracker = Arc::new(TransmissionTracker::new(
            n,
            TrackerParams {
                group_size,
                start_threshold: config.detection.start_threshold,
                stop_threshold: config.detection.stop_threshold,
                timeout: Duration::from_millis(config.detection.recording_timeout_ms),
                tuning_step: config.detection.tuning_step,
            },
            mapper.clone(),
            config.scanning.ignored_ranges.clone(),
            notification,
        ));
        let spectrogram = SpectrogramPublisher::new(
            mapper,
            sample_rate,
            decimation_factor(bin_step.round() as Frequency, config.spectrogram.min_step),
            Duration::from_millis(config.spectrogram.send_interval_ms),
            publisher.clone(),
        );
        let chain = DspChain::new(
            Framer::new(n, decimation),
            SpectralStage::new(n),
            noise,
            tracker.clone(),
            spectrogram,
        );

        let recorders: Vec<Recorder> = (0..config.device.recorders)
            .map(|_| {
                Recorder::new(
                    sample_rate,
                    config.device.output_dir.clone(),
                    publisher.clone(),
                )
            })
            .collect();
        let feeds: Vec<RecorderFeed> = recorders.iter().map(Recorder::feed).collect();

        let raw_sink = Arc::new(Mutex::new(RawFileSink::default()));
        let source = Arc::new(Mutex::new(source));
        let running = Arc::new(AtomicBool::new(true));
        let worker = spawn_dsp_worker(
            source.clone(),
            raw_sink.clone(),
            feeds,
            chain,
            running.clone(),
            sample_rate,
        );

        info!(target: LABEL, "started");
        Ok(Self {
            sample_rate,
            initial_delay: Duration::from_millis(config.scanning.initial_delay_ms),
            debug_save_raw_iq: config.device.debug_save_full_raw_iq,
            output_dir: config.device.output_dir.clone(),
            is_initialized: false,
            frequency_range,
            source,
            tracker,
            noise_processing,
            raw_sink,
            recorders,
            ignored_shifts: HashSet::new(),
            running,
            worker,
        })
    }

    /// Retune the front-end to a new range
    ///
    /// Processing is disabled across the actual tune so no stage ever sees a
    /// window that straddles two centres; the active set is cleared and the
    /// noise floor frozen until the new centre is stable.
    pub fn set_frequency_range(&mut self, range: FrequencyRange) {
        let center = range.center();
        self.noise_processing.store(false, Ordering::Release);
        self.tracker.set_processing(false);
        if self.debug_save_raw_iq {
            self.lock_raw_sink().stop();
        }

        let previous = *self
            .frequency_range
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.store_range(FrequencyRange::new(0, 0));

        let mut tuned = false;
        for _ in 0..TUNE_ATTEMPTS {
            match self
                .source
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_frequency(center)
            {
                Ok(()) => {
                    info!(
                        target: LABEL,
                        "set frequency range: {}, center frequency: {}",
                        format_frequency_range(&range),
                        format_frequency(center)
                    );
                    tuned = true;
                    break;
                }
                Err(_) => {
                    // transient tuning errors are retried silently
                }
            }
        }

        if !self.is_initialized {
            info!(
                target: LABEL,
                "waiting, initial delay: {} ms",
                self.initial_delay.as_millis()
            );
            thread::sleep(self.initial_delay);
            self.is_initialized = true;
        }

        if tuned {
            self.store_range(range);
        } else {
            warn!(
                target: LABEL,
                "tuning failed, staying on {}",
                format_frequency_range(&previous)
            );
            self.store_range(previous);
        }

        if self.debug_save_raw_iq {
            let path = clip_file_name(&self.output_dir, "full", self.center(), self.sample_rate);
            self.lock_raw_sink().start(&path);
        }
        self.tracker.set_processing(true);
        self.noise_processing.store(true, Ordering::Release);
    }

    /// Reconcile the recorder pool with the latest active set
    ///
    /// Returns true while any recorder is still capturing; the scanner uses
    /// that to hold the current range.
    pub fn update_recordings(&mut self, active: Vec<FrequencyFlush>) -> bool {
        let center = self.center();
        let is_waiting = |shift: Frequency| active.iter().any(|entry| entry.shift == shift);

        // drain recorders whose transmission left the active set
        for recorder in &self.recorders {
            if recorder.is_recording() {
                if let Some(shift) = recorder.shift() {
                    if !is_waiting(shift) {
                        info!(
                            target: LABEL,
                            "stop recorder, frequency: {}, time: {} ms",
                            format_frequency(center + shift),
                            recorder.duration().as_millis()
                        );
                        recorder.stop();
                    }
                }
            }
        }

        for entry in &active {
            if let Some(recorder) = self
                .recorders
                .iter()
                .find(|recorder| recorder.shift() == Some(entry.shift))
            {
                if !recorder.is_recording() {
                    warn!(
                        target: LABEL,
                        "start recorder that should be already started, frequency: {}",
                        format_frequency(center + entry.shift)
                    );
                }
                if entry.flush {
                    recorder.flush();
                }
            } else if let Some(free) = self
                .recorders
                .iter()
                .find(|recorder| !recorder.is_recording())
            {
                free.start(center, entry.shift);
                info!(
                    target: LABEL,
                    "start recorder, frequency: {}",
                    format_frequency(center + entry.shift)
                );
            } else if self.ignored_shifts.insert(entry.shift) {
                info!(
                    target: LABEL,
                    "no recorders available, frequency: {}",
                    format_frequency(center + entry.shift)
                );
            }
        }

        self.ignored_shifts.retain(|&shift| is_waiting(shift));

        self.recorders.iter().any(Recorder::is_recording)
    }

    pub fn center(&self) -> Frequency {
        self.frequency_range
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .center()
    }

    fn store_range(&self, range: FrequencyRange) {
        *self
            .frequency_range
            .write()
            .unwrap_or_else(PoisonError::into_inner) = range;
    }

    fn lock_raw_sink(&self) -> std::sync::MutexGuard<'_, RawFileSink> {
        self.raw_sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SdrDevice {
    fn drop(&mut self) {
        info!(target: LABEL, "stopping");
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.lock_raw_sink().stop();
        info!(target: LABEL, "stopped");
    }
}

fn spawn_dsp_worker(
    source: Arc<Mutex<Box<dyn SdrSource>>>,
    raw_sink: Arc<Mutex<RawFileSink>>,
    feeds: Vec<RecorderFeed>,
    mut chain: DspChain,
    running: Arc<AtomicBool>,
    sample_rate: Frequency,
) -> Option<JoinHandle<()>> {
    // roughly 10 ms of samples per read
    let chunk = ((sample_rate / 100) as usize).max(1024);
    thread::Builder::new()
        .name("dsp".to_string())
        .spawn(move || {
            let mut buffer = vec![Complex32::new(0.0, 0.0); chunk];
            while running.load(Ordering::Acquire) {
                let read = source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .read(&mut buffer);
                match read {
                    Ok(0) => {}
                    Ok(count) => {
                        let samples = &buffer[..count];
                        raw_sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .write(samples);
                        for feed in &feeds {
                            feed.push(samples);
                        }
                        chain.work(samples);
                    }
                    Err(err) => {
                        warn!(target: LABEL, "stream read error: {}", err);
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        })
        .ok()
}

/// Optional full-rate raw IQ dump, toggled around retunes
#[derive(Default)]
struct RawFileSink {
    writer: Option<BufWriter<File>>,
}

impl RawFileSink {
    fn start(&mut self, path: &Path) {
        match File::create(path) {
            Ok(file) => {
                info!(target: LABEL, "start raw iq dump: {:?}", path);
                self.writer = Some(BufWriter::new(file));
            }
            Err(err) => {
                warn!(target: LABEL, "cannot create raw iq dump {:?}: {}", path, err);
            }
        }
    }

    fn stop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }

    fn write(&mut self, samples: &[Complex32]) {
        if let Some(writer) = self.writer.as_mut() {
            for sample in samples {
                let result = writer
                    .write_all(&sample.re.to_le_bytes())
                    .and_then(|_| writer.write_all(&sample.im.to_le_bytes()));
                if let Err(err) = result {
                    warn!(target: LABEL, "raw iq dump write failed: {}", err);
                    self.writer = None;
                    break;
                }
            }
        }
    }
}
