//! Acknowledgment ledger for the sliding window.
//!
//! Slots are addressed by absolute sequence number. A slot is created when its
//! packet is first transmitted and is never removed from the addressable
//! range, so an ack for `base + 3` can land before `base` itself is acked.
//!
//! ```text
//!   offset      base                    next_seqno
//!     │          │                          │
//!  ───┼──────────┼──────────────────────────┼────────▶ seqno
//!     │  acked   │ <── pending / acked ───▶ │ never sent
//! ```
//!
//! Storage below `offset` has been dropped by [`WindowTracker::compact`];
//! everything there is known to be acked.

use std::collections::VecDeque;
use std::ops::Range;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("ack {ackno} refers to a sequence number never sent (next is {next_seqno})")]
    OutOfRange { ackno: u32, next_seqno: u32 },
    #[error("seqno {seqno} would leave a gap in the ledger (next is {next_seqno})")]
    Gap { seqno: u32, next_seqno: u32 },
    #[error("seqno {seqno} is outside the window [{base}, {base} + {capacity})")]
    Full { seqno: u32, base: u32, capacity: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Fresh,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    acked: bool,
    /// Time of the most recent transmission.
    sent_at: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTracker {
    capacity: u32,
    base: u32,
    offset: u32,
    slots: VecDeque<Slot>,
}

impl WindowTracker {
    /// Create an empty ledger for a window of `capacity` packets.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            base: 0,
            offset: 0,
            slots: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Lowest sequence number not yet acknowledged.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// One past the highest sequence number ever tracked.
    pub fn next_seqno(&self) -> u32 {
        self.offset + self.slots.len() as u32
    }

    fn slot(&self, seqno: u32) -> Option<&Slot> {
        seqno
            .checked_sub(self.offset)
            .and_then(|i| self.slots.get(i as usize))
    }

    /// Record a transmission of `seqno` at `now`.
    ///
    /// The first transmission of the next sequence number appends a pending
    /// slot; a retransmission refreshes the send time. Skipping ahead is
    /// rejected so the ledger stays dense, and so is any new seqno that would
    /// not fit in the window.
    pub fn track(&mut self, seqno: u32, now: Duration) -> Result<(), WindowError> {
        let next_seqno = self.next_seqno();
        if seqno == next_seqno {
            if !self.has_room() {
                return Err(WindowError::Full {
                    seqno,
                    base: self.base,
                    capacity: self.capacity,
                });
            }
            self.slots.push_back(Slot {
                acked: false,
                sent_at: now,
            });
            return Ok(());
        }
        if seqno > next_seqno {
            return Err(WindowError::Gap { seqno, next_seqno });
        }
        if let Some(i) = seqno.checked_sub(self.offset) {
            self.slots[i as usize].sent_at = now;
        }
        Ok(())
    }

    /// Mark `seqno` acknowledged. Acks for numbers never sent are rejected and
    /// never grow the ledger.
    pub fn mark_acked(&mut self, seqno: u32) -> Result<AckOutcome, WindowError> {
        let next_seqno = self.next_seqno();
        if seqno >= next_seqno {
            return Err(WindowError::OutOfRange {
                ackno: seqno,
                next_seqno,
            });
        }
        let Some(i) = seqno.checked_sub(self.offset) else {
            return Ok(AckOutcome::Duplicate);
        };
        let slot = &mut self.slots[i as usize];
        if slot.acked {
            Ok(AckOutcome::Duplicate)
        } else {
            slot.acked = true;
            Ok(AckOutcome::Fresh)
        }
    }

    pub fn is_acked(&self, seqno: u32) -> bool {
        if seqno < self.offset {
            return true;
        }
        self.slot(seqno).is_some_and(|s| s.acked)
    }

    /// Time `seqno` was last transmitted, while its slot is still stored.
    pub fn sent_at(&self, seqno: u32) -> Option<Duration> {
        self.slot(seqno).map(|s| s.sent_at)
    }

    /// Slide `base` past every consecutive acked slot and return the
    /// sequence numbers that left the window, oldest first.
    pub fn advance_base(&mut self) -> Range<u32> {
        let start = self.base;
        while self.slot(self.base).is_some_and(|s| s.acked) {
            self.base += 1;
        }
        start..self.base
    }

    /// Number of tracked sequence numbers at or above `base` still awaiting an ack.
    pub fn in_flight(&self) -> u32 {
        (self.base..self.next_seqno())
            .filter(|&seqno| !self.is_acked(seqno))
            .count() as u32
    }

    /// `true` when another new sequence number fits in `[base, base + N)`.
    pub fn has_room(&self) -> bool {
        self.next_seqno() < self.base.saturating_add(self.capacity)
    }

    /// Release storage for slots below `base`. Addressing stays absolute.
    pub fn compact(&mut self) {
        let drop = (self.base - self.offset) as usize;
        self.slots.drain(..drop);
        self.offset = self.base;
    }

    /// Number of slots currently held in memory.
    pub fn stored(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: u32, sent: u32) -> WindowTracker {
        let mut w = WindowTracker::new(capacity);
        for seqno in 0..sent {
            w.track(seqno, Duration::from_millis(seqno as u64)).unwrap();
        }
        w
    }

    #[test]
    fn initial_state() {
        let w = WindowTracker::new(4);
        assert_eq!(w.base(), 0);
        assert_eq!(w.next_seqno(), 0);
        assert_eq!(w.in_flight(), 0);
        assert!(w.has_room());
        assert!(!w.is_acked(0));
    }

    #[test]
    fn track_appends_and_refreshes() {
        let mut w = filled(4, 2);
        assert_eq!(w.next_seqno(), 2);
        assert_eq!(w.sent_at(1), Some(Duration::from_millis(1)));

        w.track(1, Duration::from_secs(3)).unwrap();
        assert_eq!(w.next_seqno(), 2);
        assert_eq!(w.sent_at(1), Some(Duration::from_secs(3)));
    }

    #[test]
    fn track_rejects_gap() {
        let mut w = filled(4, 2);
        assert_eq!(
            w.track(5, Duration::ZERO),
            Err(WindowError::Gap {
                seqno: 5,
                next_seqno: 2
            })
        );
        assert_eq!(w.next_seqno(), 2);
    }

    #[test]
    fn ack_for_unsent_seqno_is_out_of_range() {
        let mut w = filled(4, 3);
        let before = w.clone();
        assert_eq!(
            w.mark_acked(3),
            Err(WindowError::OutOfRange {
                ackno: 3,
                next_seqno: 3
            })
        );
        assert_eq!(w, before);
        assert_eq!(w.next_seqno(), 3);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let mut w = filled(4, 4);
        assert_eq!(w.mark_acked(2), Ok(AckOutcome::Fresh));
        let once = w.clone();
        assert_eq!(w.mark_acked(2), Ok(AckOutcome::Duplicate));
        assert_eq!(w, once);
    }

    #[test]
    fn out_of_order_acks_advance_base_together() {
        let mut w = filled(4, 4);

        w.mark_acked(2).unwrap();
        assert_eq!(w.advance_base(), 0..0);
        assert_eq!(w.in_flight(), 3);

        w.mark_acked(0).unwrap();
        assert_eq!(w.advance_base(), 0..1);
        assert_eq!(w.base(), 1);

        w.mark_acked(1).unwrap();
        assert_eq!(w.advance_base(), 1..3);
        assert_eq!(w.base(), 3);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn has_room_follows_base() {
        let mut w = filled(3, 3);
        assert!(!w.has_room());
        assert_eq!(
            w.track(3, Duration::ZERO),
            Err(WindowError::Full {
                seqno: 3,
                base: 0,
                capacity: 3
            })
        );
        assert_eq!(w.next_seqno(), 3);

        // Retransmissions inside a full window are still fine.
        w.track(0, Duration::from_secs(1)).unwrap();

        w.mark_acked(0).unwrap();
        w.advance_base();
        assert!(w.has_room());
        w.track(3, Duration::ZERO).unwrap();
        assert_eq!(w.in_flight(), w.capacity());
    }

    #[test]
    fn compact_keeps_absolute_addressing() {
        let mut w = filled(6, 6);
        for seqno in [0, 1, 2, 4] {
            w.mark_acked(seqno).unwrap();
        }
        assert_eq!(w.advance_base(), 0..3);
        w.compact();

        assert_eq!(w.stored(), 3);
        assert_eq!(w.base(), 3);
        assert!(w.is_acked(1));
        assert!(!w.is_acked(3));
        assert!(w.is_acked(4));
        assert_eq!(w.sent_at(5), Some(Duration::from_millis(5)));
        assert_eq!(w.mark_acked(0), Ok(AckOutcome::Duplicate));

        w.track(6, Duration::ZERO).unwrap();
        assert_eq!(w.next_seqno(), 7);
        w.mark_acked(3).unwrap();
        assert_eq!(w.advance_base(), 3..5);
    }
}
