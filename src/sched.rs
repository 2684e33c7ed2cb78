// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Cooperative poll scheduler.
//!
//! Driven by a monotonic 32-bit tick source. Ticks are opaque units (the board knows the
//! rate); all comparisons are wrapping signed differences, so schedules stay correct across
//! counter wrap as long as no period exceeds half the tick range.
//!
//! If the main loop falls behind by one or more full periods, the scheduler skips the missed
//! periods instead of bursting catch-up polls: `next_due` is re-phased from `now` and the
//! per-entry `missed_polls` counter records how many fires were dropped.

use log::warn;

use crate::bus::BusManager;
use crate::protocol::messages::{FrameSink, Response};
use crate::registry::{Driver, Oid, PollStatus, Registry, SampleBuf, MAX_DRIVERS};

/// Largest accepted poll period, in ticks.
pub const MAX_PERIOD: u32 = 1 << 31;

#[derive(Copy, Clone)]
struct Slot {
    period: u32,
    next_due: u32,
    missed: u32,
}

/// Wrapping "now is at or past due" comparison.
#[inline]
fn tick_reached(now: u32, due: u32) -> bool {
    now.wrapping_sub(due) as i32 >= 0
}

/// Per-OID poll timing. One slot per polling registry entry.
pub struct PollScheduler {
    slots: [Option<Slot>; MAX_DRIVERS],
    min_period: u32,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_DRIVERS],
            min_period: 1,
        }
    }

    /// Lower bound on poll periods, in ticks. The board sets this from its tick rate
    /// (e.g. 12_000 for 1 ms at 12 MHz).
    pub fn with_min_period(mut self, ticks: u32) -> Self {
        self.min_period = ticks.max(1);
        self
    }

    pub fn min_period(&self) -> u32 {
        self.min_period
    }

    /// Whether `period` is acceptable for `start_poll`.
    pub fn period_in_range(&self, period: u32) -> bool {
        period >= self.min_period && period <= MAX_PERIOD
    }

    /// Schedule `oid` every `period` ticks, first fire at `now + period`.
    pub fn add(&mut self, oid: Oid, period: u32, now: u32) {
        if let Some(slot) = self.slots.get_mut(oid as usize) {
            *slot = Some(Slot {
                period,
                next_due: now.wrapping_add(period),
                missed: 0,
            });
        }
    }

    /// Drop the slot for `oid`. No-op when absent.
    pub fn remove(&mut self, oid: Oid) {
        if let Some(slot) = self.slots.get_mut(oid as usize) {
            *slot = None;
        }
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.slots
            .get(oid as usize)
            .is_some_and(|s| s.is_some())
    }

    /// Missed-period counter for a scheduled OID.
    pub fn missed_polls(&self, oid: Oid) -> Option<u32> {
        self.slots.get(oid as usize)?.as_ref().map(|s| s.missed)
    }

    /// One cooperative pass: run every due Poll hook, ordered by due tick then OID, and
    /// emit a `poll_data` frame per produced sample. Hook failures are logged, counted on
    /// the entry, and never stop the schedule.
    pub fn step<D: Driver, S: FrameSink>(
        &mut self,
        now: u32,
        registry: &mut Registry<D>,
        buses: &mut BusManager<'_>,
        sink: &mut S,
    ) {
        let mut due: [(u32, Oid); MAX_DRIVERS] = [(0, 0); MAX_DRIVERS];
        let mut count = 0;
        for (idx, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                if tick_reached(now, slot.next_due) {
                    due[count] = (slot.next_due, idx as Oid);
                    count += 1;
                }
            }
        }
        // Earliest due first: larger lag from `now` means earlier. Ties by OID.
        due[..count].sort_unstable_by(|a, b| {
            let lag_a = now.wrapping_sub(a.0);
            let lag_b = now.wrapping_sub(b.0);
            lag_b.cmp(&lag_a).then(a.1.cmp(&b.1))
        });

        for &(_, oid) in &due[..count] {
            let Some(slot) = self.slots.get_mut(oid as usize).and_then(|s| s.as_mut()) else {
                continue;
            };
            // Advance phase-preservingly before the hook runs.
            let lag = now.wrapping_sub(slot.next_due);
            if lag >= slot.period {
                slot.missed += lag / slot.period;
                slot.next_due = now.wrapping_add(slot.period - lag % slot.period);
            } else {
                slot.next_due = slot.next_due.wrapping_add(slot.period);
            }

            let mut sample = SampleBuf::new();
            match registry.poll_entry(oid, buses, &mut sample) {
                Ok(PollStatus::Ready) => {
                    sink.emit(&Response::poll_data(oid, now, sample.as_slice()));
                }
                Ok(PollStatus::NoData) => {}
                Err(err) => {
                    warn!("oid {} poll failed: {:?}", oid, err);
                    registry.note_poll_error(oid);
                }
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
