// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Outbound publication
//!
//! The scanner publishes spectrogram frames and recorded-clip metadata as
//! JSON payloads on per-device topics. The broker transport itself lives
//! behind the `MessageSink` trait; the daemon wires in whichever sink the
//! deployment uses.

pub mod data_controller;

pub use data_controller::{DataController, DataPublisher, RecordingMetadata, SpectrogramFrame};

use anyhow::Result;
use log::debug;

/// Transport for outbound messages, e.g. an MQTT client
pub trait MessageSink: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Sink that only logs, for deployments without a broker
pub struct LogSink;

impl MessageSink for LogSink {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        debug!(target: "publish", "{}: {} bytes", topic, payload.len());
        Ok(())
    }
}
