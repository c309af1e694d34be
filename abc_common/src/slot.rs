//! Single-slot latest-value cell.
//!
//! Each controller owns one `Slot` and overwrites it on every step; the
//! aggregator reads whatever it holds at tick time (last-write-wins, no
//! queueing). Readers never block the writer.
//!
//! ## Lock-Free Protocol
//!
//! `seq` uses the odd/even protocol:
//! - Odd = write in progress (reader must retry)
//! - Even = committed (reader can use the words it just read)
//!
//! Payload words are stored as `AtomicU64` bit patterns, so a racing read is
//! never undefined behaviour; the sequence check only rejects torn pairs.
//!
//! Contract: one writer per slot. Concurrent writers are memory-safe but may
//! publish a mix of their two values.

use core::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering, fence};

use crate::robot::types::{OrientationSample, WheelCommand};

/// Reads spun before falling back to `yield_now`.
const SPINS_BEFORE_YIELD: u32 = 64;

/// A value that can be stored in a [`Slot`] as two f64 words.
pub trait SlotValue: Copy {
    fn to_words(&self) -> [f64; 2];
    fn from_words(words: [f64; 2]) -> Self;
}

impl SlotValue for WheelCommand {
    #[inline]
    fn to_words(&self) -> [f64; 2] {
        [self.left, self.right]
    }

    #[inline]
    fn from_words(words: [f64; 2]) -> Self {
        Self::new(words[0], words[1])
    }
}

impl SlotValue for OrientationSample {
    #[inline]
    fn to_words(&self) -> [f64; 2] {
        [self.theta_deg, self.theta_deg_dot]
    }

    #[inline]
    fn from_words(words: [f64; 2]) -> Self {
        Self {
            theta_deg: words[0],
            theta_deg_dot: words[1],
        }
    }
}

/// Latest-value cell with torn-read protection.
#[derive(Debug)]
pub struct Slot<T: SlotValue> {
    seq: AtomicU64,
    words: [AtomicU64; 2],
    _marker: PhantomData<T>,
}

impl<T: SlotValue> Slot<T> {
    /// Create a slot holding `initial` (version 0).
    pub fn new(initial: T) -> Self {
        let [a, b] = initial.to_words();
        Self {
            seq: AtomicU64::new(0),
            words: [AtomicU64::new(a.to_bits()), AtomicU64::new(b.to_bits())],
            _marker: PhantomData,
        }
    }

    /// Overwrite the held value.
    pub fn store(&self, value: T) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for (cell, word) in self.words.iter().zip(value.to_words()) {
            cell.store(word.to_bits(), Ordering::Relaxed);
        }

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read the latest committed value.
    pub fn load(&self) -> T {
        let mut spins = 0u32;
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let a = self.words[0].load(Ordering::Relaxed);
                let b = self.words[1].load(Ordering::Relaxed);
                fence(Ordering::Acquire);
                let after = self.seq.load(Ordering::Relaxed);
                if before == after {
                    return T::from_words([f64::from_bits(a), f64::from_bits(b)]);
                }
            }

            spins += 1;
            if spins < SPINS_BEFORE_YIELD {
                core::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Number of completed writes.
    #[inline]
    pub fn version(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }
}

impl<T: SlotValue + Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn new_slot_holds_initial_value() {
        let slot = Slot::new(WheelCommand::new(1.0, -1.0));
        assert_eq!(slot.load(), WheelCommand::new(1.0, -1.0));
        assert_eq!(slot.version(), 0);
    }

    #[test]
    fn last_write_wins() {
        let slot: Slot<WheelCommand> = Slot::default();
        slot.store(WheelCommand::symmetric(3.0));
        slot.store(WheelCommand::symmetric(7.0));
        assert_eq!(slot.load(), WheelCommand::symmetric(7.0));
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn orientation_round_trip_preserves_special_values() {
        let slot: Slot<OrientationSample> = Slot::default();
        let s = OrientationSample {
            theta_deg: -0.0,
            theta_deg_dot: f64::MIN_POSITIVE,
        };
        slot.store(s);
        let back = slot.load();
        assert_eq!(back.theta_deg.to_bits(), (-0.0f64).to_bits());
        assert_eq!(back.theta_deg_dot, f64::MIN_POSITIVE);
    }

    #[test]
    fn concurrent_reader_never_sees_torn_pair() {
        // Writer always stores (n, -n); a torn read would break the invariant.
        let slot = Arc::new(Slot::new(WheelCommand::ZERO));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let slot = Arc::clone(&slot);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for n in 0..200_000u32 {
                    let v = n as f64;
                    slot.store(WheelCommand::new(v, -v));
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut reads = 0u64;
        while !done.load(Ordering::Acquire) {
            let c = slot.load();
            assert_eq!(c.left, -c.right, "torn read: {c:?}");
            reads += 1;
        }
        writer.join().unwrap();
        assert!(reads > 0);
        assert_eq!(slot.load(), WheelCommand::new(199_999.0, -199_999.0));
    }
}
