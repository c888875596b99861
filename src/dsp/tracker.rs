// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Transmission tracking
//!
//! A hysteretic state machine per spectral bin. A bin must exceed the start
//! threshold to open a transmission and stay below the stop threshold for
//! longer than the timeout to close it again. Adjacent bins within the group
//! size are collapsed into one detection, strongest bin first, so a wideband
//! signal lighting up many bins reports a single centre.
//!
//! Per window the order is fixed: refresh last-data times, expire, promote.
//! A bin with fresh data can therefore never be expired in the same window,
//! but a bin that fell below the start threshold is not re-promoted until it
//! crosses it again.
//!
//! `work` and `set_processing` share one lock; nothing else reads the
//! internal state.

use super::BinMapper;
use crate::radio::notification::TransmissionNotification;
use crate::radio::utils::tuned_frequency;
use crate::radio::{format_frequency, Frequency, FrequencyFlush, FrequencyRange};
use log::{debug, info};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

const LABEL: &str = "transmission";

pub struct TrackerParams {
    /// Bins this close to an active one are absorbed by it
    pub group_size: usize,
    /// dB over the noise floor required to open a transmission
    pub start_threshold: f32,
    /// dB over the noise floor that keeps a transmission alive
    pub stop_threshold: f32,
    /// Time below the stop threshold after which a transmission closes
    pub timeout: Duration,
    /// Snap granularity for reported shifts
    pub tuning_step: Frequency,
}

struct TrackerState {
    processing: bool,
    active: BTreeSet<usize>,
    last_data: Vec<Option<Instant>>,
}

pub struct TransmissionTracker {
    params: TrackerParams,
    mapper: BinMapper,
    ignored_ranges: Vec<FrequencyRange>,
    notification: Arc<TransmissionNotification>,
    state: Mutex<TrackerState>,
}

impl TransmissionTracker {
    pub fn new(
        fft_size: usize,
        params: TrackerParams,
        mapper: BinMapper,
        ignored_ranges: Vec<FrequencyRange>,
        notification: Arc<TransmissionNotification>,
    ) -> Self {
        info!(target: LABEL, "group size: {}", params.group_size);
        Self {
            params,
            mapper,
            ignored_ranges,
            notification,
            state: Mutex::new(TrackerState {
                processing: false,
                active: BTreeSet::new(),
                last_data: vec![None; fft_size],
            }),
        }
    }

    /// Process one noise-subtracted PSD window
    pub fn work(&self, psd: &[f32], now: Instant) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !state.processing {
            return;
        }
        debug_assert_eq!(psd.len(), state.last_data.len());

        let candidates = self.sorted_candidates(psd);
        self.update_last_data(&mut state, psd, now);
        self.expire(&mut state, psd, now);
        self.promote(&mut state, psd, &candidates);
        self.notification.notify(self.sorted_transmissions(&state, psd, now));
    }

    /// Gate the tracker; disabling clears the active set
    pub fn set_processing(&self, processing: bool) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !processing {
            for &index in &state.active {
                info!(
                    target: LABEL,
                    "stop transmission, frequency: {}",
                    format_frequency(self.mapper.frequency(index))
                );
            }
            state.active.clear();
        }
        state.processing = processing;
    }

    /// Snapshot of the active bin indices, ascending
    pub fn active_bins(&self) -> Vec<usize> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .iter()
            .copied()
            .collect()
    }

    /// Bins over the start threshold inside the scanned sub-range, strongest
    /// first
    fn sorted_candidates(&self, psd: &[f32]) -> Vec<usize> {
        let mut candidates: Vec<usize> = (0..psd.len())
            .filter(|&i| {
                self.params.start_threshold <= psd[i]
                    && self.mapper.in_range(i)
                    && !self.is_ignored(self.mapper.frequency(i))
            })
            .collect();
        candidates.sort_by(|&a, &b| {
            psd[b].partial_cmp(&psd[a]).unwrap_or(CmpOrdering::Equal)
        });
        candidates
    }

    fn is_ignored(&self, frequency: Frequency) -> bool {
        self.ignored_ranges
            .iter()
            .any(|range| range.contains(frequency))
    }

    /// Refresh last-data for every bin with power, active or not, so a
    /// reopening transmission is seen instantly
    fn update_last_data(&self, state: &mut TrackerState, psd: &[f32], now: Instant) {
        for (index, &power) in psd.iter().enumerate() {
            if self.params.stop_threshold <= power {
                state.last_data[index] = Some(now);
            }
        }
    }

    fn expire(&self, state: &mut TrackerState, psd: &[f32], now: Instant) {
        let timeout = self.params.timeout;
        let expired: Vec<usize> = state
            .active
            .iter()
            .copied()
            .filter(|&index| match state.last_data[index] {
                Some(last) => timeout < now.duration_since(last),
                None => true,
            })
            .collect();
        for index in expired {
            info!(
                target: LABEL,
                "stop transmission, frequency: {}, power: {:.2}",
                format_frequency(self.mapper.frequency(index)),
                psd[index]
            );
            state.active.remove(&index);
        }
    }

    /// Open transmissions for candidates with no active neighbour within the
    /// group size; iterating strongest-first makes the strongest bin win
    fn promote(&self, state: &mut TrackerState, psd: &[f32], candidates: &[usize]) {
        let group = self.params.group_size;
        for &index in candidates {
            let low = index.saturating_sub(group);
            let high = index + group;
            if state.active.range(low..=high).next().is_some() {
                debug!(
                    target: LABEL,
                    "group, frequency: {}, power: {:.2}",
                    format_frequency(self.mapper.frequency(index)),
                    psd[index]
                );
                continue;
            }
            info!(
                target: LABEL,
                "start transmission, frequency: {}, power: {:.2}",
                format_frequency(self.mapper.frequency(index)),
                psd[index]
            );
            state.active.insert(index);
        }
    }

    /// Active set as snapped shifts, strongest first; `flush` marks bins
    /// that carried data in this very window
    fn sorted_transmissions(
        &self,
        state: &TrackerState,
        psd: &[f32],
        now: Instant,
    ) -> Vec<FrequencyFlush> {
        let mut indexes: Vec<usize> = state.active.iter().copied().collect();
        indexes.sort_by(|&a, &b| {
            psd[b].partial_cmp(&psd[a]).unwrap_or(CmpOrdering::Equal)
        });
        indexes
            .into_iter()
            .map(|index| FrequencyFlush {
                shift: tuned_frequency(self.mapper.shift(index), self.params.tuning_step),
                flush: state.last_data[index] == Some(now),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    const FFT_SIZE: usize = 8;
    const SAMPLE_RATE: Frequency = 8000;

    fn tracker(group_size: usize, timeout_ms: u64) -> (TransmissionTracker, Arc<TransmissionNotification>) {
        let notification = Arc::new(TransmissionNotification::new());
        // a range wide enough that every bin is inside it
        let range = Arc::new(RwLock::new(FrequencyRange::new(100_000, 108_000)));
        let mapper = BinMapper::new(SAMPLE_RATE, FFT_SIZE, range);
        let tracker = TransmissionTracker::new(
            FFT_SIZE,
            TrackerParams {
                group_size,
                start_threshold: 10.0,
                stop_threshold: 5.0,
                timeout: Duration::from_millis(timeout_ms),
                tuning_step: 1,
            },
            mapper,
            Vec::new(),
            notification.clone(),
        );
        tracker.set_processing(true);
        (tracker, notification)
    }

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn test_detect_hold_release() {
        let (tracker, _) = tracker(1, 100);
        let t0 = Instant::now();

        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], t0);
        assert_eq!(tracker.active_bins(), vec![3]);

        // 8 dB is below start but above stop: last-data stays fresh
        tracker.work(&[0.0, 0.0, 0.0, 8.0, 0.0, 0.0, 0.0, 0.0], at(t0, 50));
        assert_eq!(tracker.active_bins(), vec![3]);

        // silence past the timeout closes it
        tracker.work(&[0.0; 8], at(t0, 200));
        assert_eq!(tracker.active_bins(), Vec::<usize>::new());
    }

    #[test]
    fn test_grouping_suppresses_neighbours() {
        let (tracker, notification) = tracker(2, 100);
        tracker.work(&[0.0, 0.0, 15.0, 20.0, 14.0, 0.0, 0.0, 0.0], Instant::now());
        assert_eq!(tracker.active_bins(), vec![3]);
        // the one notification names the strongest bin only
        assert_eq!(notification.wait().len(), 1);
    }

    #[test]
    fn test_hysteresis_keeps_weak_transmission_alive() {
        let (tracker, _) = tracker(1, 100);
        let t0 = Instant::now();
        tracker.work(&[12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], t0);
        for step in 1..=3 {
            tracker.work(
                &[7.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                at(t0, 30 * step),
            );
            assert_eq!(tracker.active_bins(), vec![0]);
        }
    }

    #[test]
    fn test_reopening_is_instant_after_timeout_close() {
        let (tracker, _) = tracker(1, 100);
        let t0 = Instant::now();
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], t0);
        tracker.work(&[0.0; 8], at(t0, 200));
        assert_eq!(tracker.active_bins(), Vec::<usize>::new());
        // crossing start again reopens in the same window
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], at(t0, 300));
        assert_eq!(tracker.active_bins(), vec![3]);
    }

    #[test]
    fn test_active_set_never_violates_group_distance() {
        let (tracker, _) = tracker(2, 1000);
        let t0 = Instant::now();
        // strong bins everywhere, several windows apart
        for step in 0..5u64 {
            tracker.work(&[20.0, 18.0, 22.0, 19.0, 21.0, 17.0, 23.0, 16.0], at(t0, step * 10));
            let active = tracker.active_bins();
            for (a_pos, &a) in active.iter().enumerate() {
                for &b in active.iter().skip(a_pos + 1) {
                    assert!(b - a > 2, "bins {} and {} too close: {:?}", a, b, active);
                }
            }
        }
    }

    #[test]
    fn test_disable_clears_active_set() {
        let (tracker, notification) = tracker(1, 100);
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], Instant::now());
        assert_eq!(tracker.active_bins(), vec![3]);

        tracker.set_processing(false);
        assert_eq!(tracker.active_bins(), Vec::<usize>::new());

        // while disabled, work is a no-op and publishes nothing
        drop(notification.wait());
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], Instant::now());
        assert_eq!(tracker.active_bins(), Vec::<usize>::new());
    }

    #[test]
    fn test_notification_carries_snapped_shifts_strongest_first() {
        let notification = Arc::new(TransmissionNotification::new());
        let range = Arc::new(RwLock::new(FrequencyRange::new(100_000, 108_000)));
        let mapper = BinMapper::new(SAMPLE_RATE, FFT_SIZE, range);
        let tracker = TransmissionTracker::new(
            FFT_SIZE,
            TrackerParams {
                group_size: 0,
                start_threshold: 10.0,
                stop_threshold: 5.0,
                timeout: Duration::from_millis(100),
                tuning_step: 500,
            },
            mapper,
            Vec::new(),
            notification.clone(),
        );
        tracker.set_processing(true);

        let now = Instant::now();
        tracker.work(&[0.0, 15.0, 0.0, 0.0, 0.0, 0.0, 20.0, 0.0], now);
        let active = notification.wait();
        // bin 6 shift = 1000 * 6.5 - 4000 = 2500, bin 1 shift = -2500,
        // both already multiples of the 500 Hz step
        assert_eq!(
            active,
            vec![
                FrequencyFlush { shift: 2500, flush: true },
                FrequencyFlush { shift: -2500, flush: true },
            ]
        );
    }

    #[test]
    fn test_flush_clears_when_bin_coasts_on_timeout() {
        let (tracker, notification) = tracker(1, 100);
        let t0 = Instant::now();
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], t0);
        assert!(notification.wait()[0].flush);

        // below stop, still active: no fresh data, so no flush request
        tracker.work(&[0.0; 8], at(t0, 50));
        let active = notification.wait();
        assert_eq!(active.len(), 1);
        assert!(!active[0].flush);
    }

    #[test]
    fn test_ignored_range_is_never_promoted() {
        let notification = Arc::new(TransmissionNotification::new());
        let range = Arc::new(RwLock::new(FrequencyRange::new(100_000, 108_000)));
        let mapper = BinMapper::new(SAMPLE_RATE, FFT_SIZE, range.clone());
        // bin 3 sits at 100_500 Hz (center 104_000, shift -3500)
        let bin3 = BinMapper::new(SAMPLE_RATE, FFT_SIZE, range).frequency(3);
        let tracker = TransmissionTracker::new(
            FFT_SIZE,
            TrackerParams {
                group_size: 1,
                start_threshold: 10.0,
                stop_threshold: 5.0,
                timeout: Duration::from_millis(100),
                tuning_step: 1,
            },
            mapper,
            vec![FrequencyRange::new(bin3 - 100, bin3 + 100)],
            notification,
        );
        tracker.set_processing(true);
        tracker.work(&[0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 0.0], Instant::now());
        assert_eq!(tracker.active_bins(), Vec::<usize>::new());
    }
}
