// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Daemon task manager
//!
//! Wires the outbound data controller, the device and the scanner together
//! and coordinates shutdown. The realtime work happens on the dedicated
//! threads those components own; the daemon itself only keeps a heartbeat
//! task and the shutdown flag.

use crate::config::Config;
use crate::publish::{DataController, LogSink, MessageSink};
use crate::radio::{open_source, SdrDevice, TransmissionNotification};
use crate::scanner::Scanner;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Daemon {
    running: Arc<AtomicBool>,
    scanner: Option<Scanner>,
    data_controller: Option<DataController>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            scanner: None,
            data_controller: None,
            tasks: Vec::new(),
        }
    }

    /// Open the device and start all workers
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        info!("starting daemon");
        self.running.store(true, Ordering::Release);

        let sink: Arc<dyn MessageSink> = Arc::new(LogSink);
        let data_controller = DataController::new(sink, config.device.id());

        let source = open_source(&config.device).context("failed to open SDR device")?;
        let notification = Arc::new(TransmissionNotification::new());
        let device = SdrDevice::new(
            config,
            source,
            notification.clone(),
            data_controller.publisher(),
        )
        .context("failed to start SDR device")?;

        self.scanner = Some(Scanner::new(config, device, notification));
        self.data_controller = Some(data_controller);
        self.start_heartbeat();
        Ok(())
    }

    fn start_heartbeat(&mut self) {
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            while running.load(Ordering::Acquire) {
                interval.tick().await;
                debug!("daemon alive, uptime: {} s", started.elapsed().as_secs());
            }
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Signal every worker to stop
    pub fn shutdown(&self) {
        info!("shutting down daemon");
        self.running.store(false, Ordering::Release);
    }

    /// Wait for all workers to finish
    ///
    /// The scanner goes first so the device and its recorder threads drain
    /// before the data controller closes the outbound queue. Each stop joins
    /// dedicated threads, so it runs on a blocking task and is bounded by a
    /// timeout; a hung worker can never stall the runtime.
    pub async fn join(mut self) -> Result<()> {
        if let Some(mut scanner) = self.scanner.take() {
            Self::stop_blocking("scanner", move || scanner.stop()).await;
        }
        if let Some(mut data_controller) = self.data_controller.take() {
            Self::stop_blocking("data controller", move || data_controller.stop()).await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        info!("daemon stopped");
        Ok(())
    }

    async fn stop_blocking<F>(name: &str, stop: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(stop);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(result) => {
                if let Err(err) = result {
                    error!("{} shutdown panicked: {}", name, err);
                }
            }
            Err(_) => {
                warn!("{} did not stop within timeout period, may be hung", name);
            }
        }
    }
}
