// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Monotonic tick source.
//!
//! The registry core treats ticks as opaque 32-bit monotonic units; this wraps the Cortex-M
//! DWT cycle counter as the board-side source. At typical core clocks the counter wraps every
//! few tens of seconds, which the scheduler's wrapping comparisons are built for.

use cortex_m::peripheral::{DCB, DWT};

/// DWT cycle-counter tick source. One tick = one core cycle.
pub struct DwtTicks {
    _dwt: DWT,
}

impl DwtTicks {
    /// Enable the cycle counter and take it as the firmware tick source.
    pub fn new(mut dwt: DWT, dcb: &mut DCB) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self { _dwt: dwt }
    }

    /// Current tick, wrapping at 2^32.
    #[inline]
    pub fn now(&self) -> u32 {
        DWT::cycle_count()
    }
}
