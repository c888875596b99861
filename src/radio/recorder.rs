// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-transmission capture worker
//!
//! Each recorder owns a thread and a command queue. The scanner thread
//! drives the lifecycle (`start`, `flush`, `stop`) and the DSP thread feeds
//! raw samples through a `RecorderFeed`. The worker mixes the transmission
//! down to baseband and writes interleaved f32 IQ pairs to a clip file.
//!
//! Samples are buffered in memory until the first flush so that a blip that
//! never gets confirmed costs no disk traffic; stop commits whatever the
//! worker has been handed. A write error stops the clip and logs, nothing
//! propagates back to the scanner.

use super::utils::clip_file_name;
use super::{format_frequency, Frequency};
use crate::publish::{DataPublisher, RecordingMetadata};
use log::{debug, error};
use num_complex::Complex32;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const LABEL: &str = "recorder";
const CLIP_LABEL: &str = "recording";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// Stop requested, worker still finalising the clip file
    Flushing,
}

struct Shared {
    state: RecorderState,
    shift: Option<Frequency>,
    started_at: Option<Instant>,
}

enum Command {
    Start { center: Frequency, shift: Frequency },
    Samples(Vec<Complex32>),
    Flush,
    Stop,
    Shutdown,
}

pub struct Recorder {
    shared: Arc<Mutex<Shared>>,
    tx: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

/// Sample-feeding handle held by the DSP thread
pub struct RecorderFeed {
    shared: Arc<Mutex<Shared>>,
    tx: mpsc::Sender<Command>,
}

impl RecorderFeed {
    /// Hand raw samples to the worker; dropped unless the recorder is
    /// currently recording
    pub fn push(&self, samples: &[Complex32]) {
        let recording = {
            let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.state == RecorderState::Recording
        };
        if recording {
            let _ = self.tx.send(Command::Samples(samples.to_vec()));
        }
    }
}

impl Recorder {
    pub fn new(sample_rate: Frequency, output_dir: PathBuf, publisher: DataPublisher) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            state: RecorderState::Idle,
            shift: None,
            started_at: None,
        }));
        let (tx, rx) = mpsc::channel();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || worker_loop(rx, worker_shared, sample_rate, output_dir, publisher))
            .ok();
        Self {
            shared,
            tx,
            worker,
        }
    }

    pub fn feed(&self) -> RecorderFeed {
        RecorderFeed {
            shared: self.shared.clone(),
            tx: self.tx.clone(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.lock_shared().state == RecorderState::Recording
    }

    pub fn state(&self) -> RecorderState {
        self.lock_shared().state
    }

    /// Shift of the transmission being recorded (or still being flushed)
    pub fn shift(&self) -> Option<Frequency> {
        self.lock_shared().shift
    }

    pub fn duration(&self) -> Duration {
        self.lock_shared()
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    /// Begin capturing `center + shift`
    pub fn start(&self, center: Frequency, shift: Frequency) {
        {
            let mut shared = self.lock_shared();
            shared.state = RecorderState::Recording;
            shared.shift = Some(shift);
            shared.started_at = Some(Instant::now());
        }
        let _ = self.tx.send(Command::Start { center, shift });
    }

    /// Commit buffered samples to disk
    pub fn flush(&self) {
        let _ = self.tx.send(Command::Flush);
    }

    /// Stop capturing; the worker finalises the clip asynchronously
    pub fn stop(&self) {
        self.lock_shared().state = RecorderState::Flushing;
        let _ = self.tx.send(Command::Stop);
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// One in-progress clip, owned by the worker
struct Session {
    path: PathBuf,
    frequency: Frequency,
    sample_rate: Frequency,
    /// Turns of the mixing oscillator per sample
    turns_per_sample: f64,
    sample_index: u64,
    buffer: Vec<Complex32>,
    writer: Option<BufWriter<File>>,
    committed: bool,
    started_at: Instant,
    started_ms: u64,
}

impl Session {
    fn new(center: Frequency, shift: Frequency, sample_rate: Frequency, dir: &PathBuf) -> Self {
        let frequency = center + shift;
        Self {
            path: clip_file_name(dir, CLIP_LABEL, frequency, sample_rate),
            frequency,
            sample_rate,
            turns_per_sample: -(shift as f64) / sample_rate as f64,
            sample_index: 0,
            buffer: Vec::new(),
            writer: None,
            committed: false,
            started_at: Instant::now(),
            started_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }

    /// Mix down to baseband and append
    fn append(&mut self, samples: &[Complex32]) -> std::io::Result<()> {
        let mut shifted = Vec::with_capacity(samples.len());
        for sample in samples {
            let turns = self.turns_per_sample * self.sample_index as f64;
            let phase = (2.0 * std::f64::consts::PI * turns.fract()) as f32;
            shifted.push(sample * Complex32::new(phase.cos(), phase.sin()));
            self.sample_index += 1;
        }
        if self.committed {
            write_samples(self.writer.as_mut(), &shifted)
        } else {
            self.buffer.extend_from_slice(&shifted);
            Ok(())
        }
    }

    /// First flush commits the in-memory buffer and opens the file
    fn flush(&mut self) -> std::io::Result<()> {
        if !self.committed {
            let file = File::create(&self.path)?;
            self.writer = Some(BufWriter::new(file));
            let buffered = std::mem::take(&mut self.buffer);
            write_samples(self.writer.as_mut(), &buffered)?;
            self.committed = true;
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn finalize(mut self, publisher: &DataPublisher) -> std::io::Result<()> {
        self.flush()?;
        let duration_ms = self.started_at.elapsed().as_millis() as u64;
        debug!(
            target: LABEL,
            "clip finished, frequency: {}, file: {:?}",
            format_frequency(self.frequency),
            self.path
        );
        publisher.push_recording(RecordingMetadata {
            timestamp_ms: self.started_ms,
            frequency: self.frequency,
            sample_rate: self.sample_rate,
            duration_ms,
            file: self.path.to_string_lossy().into_owned(),
        });
        Ok(())
    }
}

fn write_samples(
    writer: Option<&mut BufWriter<File>>,
    samples: &[Complex32],
) -> std::io::Result<()> {
    if let Some(writer) = writer {
        for sample in samples {
            writer.write_all(&sample.re.to_le_bytes())?;
            writer.write_all(&sample.im.to_le_bytes())?;
        }
    }
    Ok(())
}

fn worker_loop(
    rx: mpsc::Receiver<Command>,
    shared: Arc<Mutex<Shared>>,
    sample_rate: Frequency,
    output_dir: PathBuf,
    publisher: DataPublisher,
) {
    let mut session: Option<Session> = None;

    let idle = |shared: &Arc<Mutex<Shared>>| {
        let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
        // only leave Flushing; a fresh Recording state belongs to the next clip
        if shared.state == RecorderState::Flushing {
            shared.state = RecorderState::Idle;
            shared.shift = None;
            shared.started_at = None;
        }
    };

    for command in rx {
        match command {
            Command::Start { center, shift } => {
                session = Some(Session::new(center, shift, sample_rate, &output_dir));
            }
            Command::Samples(samples) => {
                if let Some(current) = session.as_mut() {
                    if let Err(err) = current.append(&samples) {
                        error!(target: LABEL, "write failed, dropping clip {:?}: {}", current.path, err);
                        session = None;
                        idle(&shared);
                    }
                }
            }
            Command::Flush => {
                if let Some(current) = session.as_mut() {
                    if let Err(err) = current.flush() {
                        error!(target: LABEL, "flush failed, dropping clip {:?}: {}", current.path, err);
                        session = None;
                        idle(&shared);
                    }
                }
            }
            Command::Stop => {
                if let Some(current) = session.take() {
                    let path = current.path.clone();
                    if let Err(err) = current.finalize(&publisher) {
                        error!(target: LABEL, "finalise failed for {:?}: {}", path, err);
                    }
                }
                idle(&shared);
            }
            Command::Shutdown => {
                if let Some(current) = session.take() {
                    let path = current.path.clone();
                    if let Err(err) = current.finalize(&publisher) {
                        error!(target: LABEL, "finalise failed for {:?}: {}", path, err);
                    }
                }
                let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
                shared.state = RecorderState::Idle;
                shared.shift = None;
                shared.started_at = None;
                break;
            }
        }
    }
}
