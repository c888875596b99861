// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Outbound serialisation worker
//!
//! Producers on the DSP and recorder threads hand frames to a cheap
//! `DataPublisher` handle; one worker thread serialises them to JSON and
//! pushes them into the sink, so a slow broker never stalls the pipeline.

use super::MessageSink;
use crate::radio::Frequency;
use log::{debug, warn};
use serde::Serialize;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One downsampled, int8-quantised PSD row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpectrogramFrame {
    pub timestamp_ms: u64,
    pub frequency: Frequency,
    pub sample_rate: Frequency,
    pub powers: Vec<i8>,
}

/// Metadata of one finished clip file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingMetadata {
    pub timestamp_ms: u64,
    pub frequency: Frequency,
    pub sample_rate: Frequency,
    pub duration_ms: u64,
    pub file: String,
}

enum Outbound {
    Spectrogram(SpectrogramFrame),
    Recording(RecordingMetadata),
    Shutdown,
}

/// Cloneable producer handle
#[derive(Clone)]
pub struct DataPublisher {
    tx: mpsc::Sender<Outbound>,
}

impl DataPublisher {
    pub fn push_spectrogram(&self, frame: SpectrogramFrame) {
        if self.tx.send(Outbound::Spectrogram(frame)).is_err() {
            debug!(target: "publish", "dropping spectrogram frame, controller stopped");
        }
    }

    pub fn push_recording(&self, metadata: RecordingMetadata) {
        if self.tx.send(Outbound::Recording(metadata)).is_err() {
            debug!(target: "publish", "dropping recording metadata, controller stopped");
        }
    }
}

/// Owns the serialisation thread; dropping it drains and stops the worker
pub struct DataController {
    tx: Option<mpsc::Sender<Outbound>>,
    worker: Option<JoinHandle<()>>,
}

impl DataController {
    pub fn new(sink: Arc<dyn MessageSink>, device_id: String) -> Self {
        let (tx, rx) = mpsc::channel::<Outbound>();
        let worker = thread::Builder::new()
            .name("data-controller".to_string())
            .spawn(move || {
                let spectrogram_topic = format!("spectrogram/{}", device_id);
                let recordings_topic = format!("recordings/{}", device_id);
                for message in rx {
                    let (topic, payload) = match &message {
                        Outbound::Spectrogram(frame) => {
                            (&spectrogram_topic, serde_json::to_vec(frame))
                        }
                        Outbound::Recording(metadata) => {
                            (&recordings_topic, serde_json::to_vec(metadata))
                        }
                        Outbound::Shutdown => break,
                    };
                    match payload {
                        Ok(payload) => {
                            if let Err(err) = sink.publish(topic, &payload) {
                                warn!(target: "publish", "publish to {} failed: {}", topic, err);
                            }
                        }
                        Err(err) => {
                            warn!(target: "publish", "serialisation failed: {}", err);
                        }
                    }
                }
            })
            .ok();

        Self {
            tx: Some(tx),
            worker,
        }
    }

    pub fn publisher(&self) -> DataPublisher {
        DataPublisher {
            tx: self
                .tx
                .as_ref()
                .cloned()
                .unwrap_or_else(|| mpsc::channel().0),
        }
    }

    /// Stop the worker after draining everything queued so far
    ///
    /// Producer handles may still be alive; their sends fail quietly once
    /// the worker is gone.
    pub fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outbound::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for DataController {
    fn drop(&mut self) {
        self.stop();
    }
}
