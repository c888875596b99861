// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Latest-wins transmission notification
//!
//! A single-slot mailbox between the transmission tracker (producer, DSP
//! thread) and the scanner loop (consumer). `notify` overwrites any unread
//! value, so the scanner always acts on the most recent active set and never
//! drains a backlog of stale ones.

use super::FrequencyFlush;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Default)]
pub struct TransmissionNotification {
    slot: Mutex<Option<Vec<FrequencyFlush>>>,
    available: Condvar,
}

impl TransmissionNotification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the current active set, replacing any unread one
    pub fn notify(&self, active: Vec<FrequencyFlush>) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(active);
        self.available.notify_one();
    }

    /// Block until a notification is available and take it
    pub fn wait(&self) -> Vec<FrequencyFlush> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(active) = slot.take() {
                return active;
            }
            slot = self
                .available
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
