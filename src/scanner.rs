// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Range-cycling scanner loop
//!
//! Owns the control thread and the device. Each configured range gets a
//! bounded dwell window; the scanner stays put while any recording is in
//! flight and moves on as soon as the range goes idle and the dwell timer
//! expires. Shutdown posts a sentinel notification so the thread wakes
//! immediately.

use crate::config::Config;
use crate::radio::utils::split_ranges;
use crate::radio::{
    format_frequency_range, FrequencyRange, SdrDevice, TransmissionNotification,
};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const LABEL: &str = "scanner";

pub struct Scanner {
    is_running: Arc<AtomicBool>,
    notification: Arc<TransmissionNotification>,
    worker: Option<JoinHandle<()>>,
}

impl Scanner {
    pub fn new(
        config: &Config,
        device: SdrDevice,
        notification: Arc<TransmissionNotification>,
    ) -> Self {
        info!(target: LABEL, "starting");
        info!(
            target: LABEL,
            "ignored ranges: {}",
            config.scanning.ignored_ranges.len()
        );
        for range in &config.scanning.ignored_ranges {
            info!(target: LABEL, "ignored range: {}", format_frequency_range(range));
        }
        let ranges = split_ranges(&config.scanning.scanned_ranges, config.device.sample_rate);
        info!(target: LABEL, "scanned ranges: {}", ranges.len());
        for range in &ranges {
            info!(target: LABEL, "scanned range: {}", format_frequency_range(range));
        }

        let is_running = Arc::new(AtomicBool::new(true));
        let range_scan_time = Duration::from_millis(config.scanning.range_scan_time_ms);
        let worker = {
            let is_running = is_running.clone();
            let notification = notification.clone();
            thread::Builder::new()
                .name("scanner".to_string())
                .spawn(move || {
                    worker(device, ranges, range_scan_time, is_running, notification)
                })
                .ok()
        };
        info!(target: LABEL, "started");
        Self {
            is_running,
            notification,
            worker,
        }
    }

    /// Stop the loop and wait for the thread; the device is dropped with it
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        self.notification.notify(Vec::new());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker(
    mut device: SdrDevice,
    ranges: Vec<FrequencyRange>,
    range_scan_time: Duration,
    is_running: Arc<AtomicBool>,
    notification: Arc<TransmissionNotification>,
) {
    info!(target: LABEL, "thread started");
    let running = || is_running.load(Ordering::Acquire);

    if ranges.is_empty() {
        warn!(target: LABEL, "empty scanned ranges");
        while running() {
            let _ = notification.wait();
        }
    } else if ranges.len() == 1 {
        device.set_frequency_range(ranges[0]);
        while running() {
            device.update_recordings(notification.wait());
        }
    } else {
        'outer: while running() {
            for range in &ranges {
                device.set_frequency_range(*range);

                let dwell_started = Instant::now();
                let mut idle = true;
                while dwell_started.elapsed() <= range_scan_time && idle && running() {
                    idle = !device.update_recordings(notification.wait());
                }
                // an in-flight recording holds the range past the dwell
                while !idle && running() {
                    idle = !device.update_recordings(notification.wait());
                }
                if !running() {
                    break 'outer;
                }
            }
        }
    }
    info!(target: LABEL, "thread stopped");
}
