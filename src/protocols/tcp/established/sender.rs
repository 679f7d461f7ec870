// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Send window & transmitter (`spec.md` §4.3): segmentation, the
//! congestion/advertised-window-gated transmit loop, and draining fully
//! acknowledged segments off the front of the queue.

use super::super::{
    constants::MSS,
    header::TcpHeader,
    seq_number::{before, SeqNumber},
};
use bytes::Bytes;
use std::{cmp::min, collections::VecDeque, time::Instant};

//==============================================================================
// Structures
//==============================================================================

/// One outstanding (or not-yet-sent) outbound segment. Owns the fully
/// encoded packet so retransmission never re-serializes it.
pub struct SendSlot {
    pub seq: SeqNumber,
    pub payload_len: u16,
    packet: Bytes,
    pub is_sent: bool,
    pub send_time: Option<Instant>,
    /// Set on the one in-flight segment chosen to carry an RTT sample; left
    /// unset on a retransmission of that segment (`spec.md` §3, "Send
    /// slot").
    pub is_rtt_sample: bool,
}

impl SendSlot {
    pub fn packet(&self) -> &Bytes {
        &self.packet
    }
}

/// An ordered queue of outstanding segments plus the cursor used to assign
/// new sequence numbers, together forming the `[oldest_unacked,
/// last_byte_sent)` range required by I3.
pub struct Sender {
    queue: VecDeque<SendSlot>,
    last_byte_sent: SeqNumber,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Sender {
    pub fn new(initial_seq_no: SeqNumber) -> Self {
        Self {
            queue: VecDeque::new(),
            last_byte_sent: initial_seq_no,
        }
    }

    pub fn last_byte_sent(&self) -> SeqNumber {
        self.last_byte_sent
    }

    /// Lowest sequence number not yet cumulatively acknowledged, i.e. the
    /// left edge of the `send_window` range (I3). `None` once the queue has
    /// drained empty.
    pub fn oldest_unacked_seq(&self) -> Option<SeqNumber> {
        self.queue.front().map(|s| s.seq)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Segments `data` into MSS-sized chunks (the last may be short) and
    /// appends each as an unsent slot, advancing `last_byte_sent`. Building
    /// the packet bytes (header + payload) is deferred to
    /// [`Sender::transmit`] for a fresh ACK/advertised-window snapshot at
    /// the moment each slot is actually put on the wire would be wrong here
    /// — the source bakes the piggybacked `ack`/`advertised_window` in at
    /// *enqueue* time, and this core preserves that (`spec.md` §4.3).
    pub fn enqueue(
        &mut self,
        data: &[u8],
        src_port: u16,
        dst_port: u16,
        next_seq_expected: SeqNumber,
        advertised_window: u16,
    ) {
        let mut offset = 0usize;
        while offset < data.len() {
            let chunk_len = min(data.len() - offset, MSS as usize);
            let chunk = &data[offset..offset + chunk_len];

            let hdr = TcpHeader::new(
                src_port,
                dst_port,
                self.last_byte_sent,
                next_seq_expected,
                0, // data segments carry no ACK flag (spec.md 4.3)
                advertised_window,
                chunk_len as u16,
            );
            let mut buf = [0u8; super::super::header::TCP_HEADER_SIZE];
            hdr.serialize(&mut buf);

            let mut packet = bytes::BytesMut::with_capacity(buf.len() + chunk_len);
            packet.extend_from_slice(&buf);
            packet.extend_from_slice(chunk);

            self.queue.push_back(SendSlot {
                seq: self.last_byte_sent,
                payload_len: chunk_len as u16,
                packet: packet.freeze(),
                is_sent: false,
                send_time: None,
                is_rtt_sample: false,
            });

            self.last_byte_sent = self.last_byte_sent + chunk_len as u32;
            offset += chunk_len;
        }
    }

    /// Sends as many unsent slots, in order, as the congestion/advertised
    /// window allows (`spec.md` §4.3, `transmit_send_window`). Stops at the
    /// first slot that would exceed the effective window so the send queue
    /// is never transmitted with a gap (I4).
    pub fn transmit(
        &mut self,
        cwnd: u32,
        advertised_window: u16,
        last_ack_received: SeqNumber,
        mut send_datagram: impl FnMut(&Bytes),
    ) {
        if self.queue.is_empty() {
            return;
        }
        let effective_window = min(cwnd, advertised_window as u32);

        let mut bytes_in_flight: u32 = self
            .queue
            .iter()
            .filter(|s| s.is_sent && !has_been_acked(s.seq, last_ack_received))
            .map(|s| s.payload_len as u32)
            .sum();

        let now = Instant::now();
        for slot in self.queue.iter_mut() {
            if slot.is_sent {
                continue;
            }
            let payload_len = slot.payload_len as u32;
            if bytes_in_flight + payload_len > effective_window {
                break;
            }
            slot.is_sent = true;
            slot.send_time = Some(now);
            send_datagram(&slot.packet);
            bytes_in_flight += payload_len;
        }
    }

    /// Pops fully acknowledged slots off the front of the queue
    /// (`spec.md` §4.3, `receive_send_window`). Stops at the first slot
    /// that is unsent or not yet covered by `last_ack_received`.
    pub fn drain_acked(&mut self, last_ack_received: SeqNumber) {
        while let Some(slot) = self.queue.front() {
            if !slot.is_sent || !has_been_acked(slot.seq, last_ack_received) {
                break;
            }
            self.queue.pop_front();
        }
    }

    /// Resends the oldest unacked slot (head-of-line), on either a fast
    /// retransmit or an RTO (`spec.md` §4.3). Unsets the RTT-sample marker,
    /// the same way the source clears `initial_tx` before resending so the
    /// retransmitted copy is never mistaken for an RTT sample.
    pub fn retransmit_oldest(&mut self, mut send_datagram: impl FnMut(&Bytes)) -> bool {
        match self.queue.front_mut() {
            Some(slot) => {
                slot.is_rtt_sample = false;
                slot.is_sent = true;
                slot.send_time = Some(Instant::now());
                send_datagram(&slot.packet);
                true
            }
            None => false,
        }
    }
}

/// `has_been_acked(seq) == before(seq, last_ack_received)`, strict
/// (`spec.md` §4.1): a segment starting exactly at `last_ack_received` is
/// not yet covered.
pub fn has_been_acked(seq: SeqNumber, last_ack_received: SeqNumber) -> bool {
    before(seq, last_ack_received)
}

//==============================================================================
// Unit Tests
//==============================================================================
