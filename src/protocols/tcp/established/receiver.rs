// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Receive reassembly window (`spec.md` §4.2). Out-of-order segments are
//! held in a bounded array of slots keyed by byte-offset from
//! `next_seq_expected`; [`Receiver::process`] drains the contiguous prefix
//! into the application-visible byte stream.
//!
//! The left-shift-per-delivery design follows the source directly (`spec.md`
//! §4.2's rationale); `arrayvec` gives us a fixed-capacity array with cheap
//! `remove(0)`/`push` instead of the source's manual `for` loop copy.

use super::super::{
    constants::{MSS, RECEIVE_WINDOW_SLOT_SIZE},
    header::TcpHeader,
    seq_number::{before, SeqNumber},
};
use crate::protocols::tcp::established::state::ConnectionStats;
use arrayvec::ArrayVec;
use bytes::{Bytes, BytesMut};

//==============================================================================
// Structures
//==============================================================================

/// One out-of-order slot. Holds the full encoded packet (header + payload)
/// the way the source's `receive_window_slot_t` does, so the header can be
/// re-read when the slot becomes the contiguous head.
#[derive(Clone, Default)]
struct ReceiveSlot {
    packet: Option<Bytes>,
}

impl ReceiveSlot {
    fn is_used(&self) -> bool {
        self.packet.is_some()
    }
}

/// The receive-side half of the connection state: the reassembly window
/// plus the contiguous, in-order byte stream handed to the application.
pub struct Receiver {
    slots: ArrayVec<[ReceiveSlot; RECEIVE_WINDOW_SLOT_SIZE]>,
    /// Cumulative receive cursor: lowest sequence number NOT yet delivered
    /// in-order (I1).
    next_seq_expected: SeqNumber,
    received_buf: BytesMut,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Receiver {
    pub fn new(initial_seq_expected: SeqNumber) -> Self {
        let mut slots = ArrayVec::new();
        for _ in 0..RECEIVE_WINDOW_SLOT_SIZE {
            slots.push(ReceiveSlot::default());
        }
        Self {
            slots,
            next_seq_expected: initial_seq_expected,
            received_buf: BytesMut::new(),
        }
    }

    pub fn next_seq_expected(&self) -> SeqNumber {
        self.next_seq_expected
    }

    /// Length of the in-order byte stream delivered to the application so
    /// far. Used to compute the advertised window (`spec.md` §4.3).
    pub fn received_len(&self) -> usize {
        self.received_buf.len()
    }

    /// Drains up to `max_len` bytes from the front of the delivered stream.
    pub fn read(&mut self, max_len: usize) -> Bytes {
        let n = max_len.min(self.received_buf.len());
        self.received_buf.split_to(n).freeze()
    }

    /// Ingests a data segment (`spec.md` §4.2, `add_receive_window`). `pkt`
    /// is the full encoded packet (header + payload). Stale, out-of-window,
    /// and duplicate segments are dropped silently with a counter bump.
    pub fn add(&mut self, hdr: &TcpHeader, pkt: Bytes, stats: &mut ConnectionStats) {
        if before(hdr.seq, self.next_seq_expected) {
            stats.stale_dropped += 1;
            log::debug!("dropping stale segment at seq={}", hdr.seq);
            return;
        }

        let offset = (hdr.seq - self.next_seq_expected).0;
        let slot_index = (offset / MSS as u32) as usize;

        if slot_index >= RECEIVE_WINDOW_SLOT_SIZE {
            stats.out_of_window_dropped += 1;
            log::debug!(
                "dropping out-of-window segment at seq={} (slot {})",
                hdr.seq,
                slot_index
            );
            return;
        }

        let slot = &mut self.slots[slot_index];
        if slot.is_used() {
            stats.duplicate_dropped += 1;
            log::debug!("dropping duplicate segment at seq={}", hdr.seq);
            return;
        }
        slot.packet = Some(pkt);
    }

    /// Drains the contiguous prefix of the reassembly window into
    /// `received_buf` (`spec.md` §4.2, `process_receive_window`). Repeats
    /// while slot 0 is used and its sequence number matches the receive
    /// cursor exactly.
    pub fn process(&mut self) {
        loop {
            let hdr = match &self.slots[0].packet {
                Some(pkt) => match TcpHeader::parse(pkt) {
                    Ok(hdr) => hdr,
                    Err(_) => break,
                },
                None => break,
            };

            if hdr.seq != self.next_seq_expected {
                break;
            }

            let pkt = self.slots[0].packet.take().unwrap();
            let payload = pkt.slice(hdr.hdr_len as usize..hdr.plen as usize);
            self.received_buf.extend_from_slice(&payload);
            self.next_seq_expected = self.next_seq_expected + payload.len() as u32;

            self.slots.remove(0);
            self.slots.push(ReceiveSlot::default());
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
