// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Lock-free single-producer/single-consumer byte ring.
//!
//! The transport RX interrupt pushes raw bytes; the main loop pops them in
//! `Dispatcher::drain`. Exactly one context may own each side; with that contract held, the
//! atomic cursors make the ring safe without a critical section, so the ISR never blocks the
//! main loop and vice versa.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// SPSC byte ring of capacity `N - 1` (one slot separates full from empty).
pub struct Fifo<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    /// Consumer cursor.
    head: AtomicUsize,
    /// Producer cursor.
    tail: AtomicUsize,
}

// SAFETY: head is only advanced by the consumer context and tail by the producer context;
// each cell is written before the tail release-store that publishes it.
unsafe impl<const N: usize> Sync for Fifo<N> {}

impl<const N: usize> Fifo<N> {
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns `false` when the ring is full.
    pub fn push(&self, byte: u8) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % N;
        if next == self.head.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            (*self.buf.get())[tail] = byte;
        }
        self.tail.store(next, Ordering::Release);
        true
    }

    /// Producer side. Returns how many bytes were accepted.
    pub fn extend(&self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&b| self.push(b)).count()
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        let byte = unsafe { (*self.buf.get())[head] };
        self.head.store((head + 1) % N, Ordering::Release);
        Some(byte)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + N - head) % N
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_order() {
        let fifo = Fifo::<8>::new();
        assert_eq!(fifo.extend(&[1, 2, 3]), 3);
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.pop(), Some(1));
        assert_eq!(fifo.pop(), Some(2));
        assert_eq!(fifo.pop(), Some(3));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn capacity_is_n_minus_one() {
        let fifo = Fifo::<4>::new();
        assert!(fifo.push(1));
        assert!(fifo.push(2));
        assert!(fifo.push(3));
        assert!(!fifo.push(4));
        assert_eq!(fifo.len(), 3);
    }

    #[test]
    fn wraps_around() {
        let fifo = Fifo::<4>::new();
        for round in 0..10u8 {
            assert!(fifo.push(round));
            assert_eq!(fifo.pop(), Some(round));
        }
        assert!(fifo.is_empty());
    }
}
