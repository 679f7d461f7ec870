// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The per-connection control block: the shared state of `spec.md` §3,
//! guarded by a single mutex per `spec.md` §5, plus the ingress classifier
//! (§4.5) and the public core API (§6) that drive it.
//!
//! Unlike `catnip`'s `Rc<RefCell<ControlBlock<RT>>>` (single-threaded,
//! reactor-driven), this core is explicitly specified as multi-threaded
//! with a shared mutex and a receive-side condition variable (`spec.md`
//! §5) — so `ControlBlock` here wraps `std::sync::{Mutex, Condvar}`
//! directly. See `DESIGN.md` for the rationale.

use super::{
    receiver::Receiver,
    sender::Sender,
    state::{
        congestion_ctrl::{CongestionControl, RenoCubic},
        ConnectionStats, RenoState,
    },
};
use crate::protocols::tcp::{
    constants::{ACK_FLAG_MASK, MAX_NETWORK_BUFFER, MSS},
    header::{TcpHeader, TCP_HEADER_SIZE},
    seq_number::SeqNumber,
};
use bytes::Bytes;
use std::{
    cmp::max,
    sync::{Arc, Condvar, Mutex},
};

//==============================================================================
// Structures
//==============================================================================

/// Out-of-scope collaborator (`spec.md` §1): an opaque `send_datagram`.
/// Production code backs this with a real UDP socket; tests back it with an
/// in-memory channel, the role `crossbeam-channel` plays in
/// `examples/AidanWoolley-catnip/tests/udp.rs`.
pub trait DatagramSink: Send + Sync {
    fn send_datagram(&self, bytes: &[u8]);
}

/// The mutable fields of `spec.md` §3's Connection State that live behind
/// the per-connection lock.
struct ConnectionState {
    sender: Sender,
    receiver: Receiver,
    congestion_ctrl: RenoCubic,
    /// Peer-reported receive capacity, refreshed from every received
    /// packet's header (`spec.md` §4.5).
    advertised_window: u16,
    stats: ConnectionStats,
}

impl ConnectionState {
    /// `max(MAX_NETWORK_BUFFER - received_len, MSS)`, computed once and
    /// shared by the data-segment send path and the pure-ACK reply path
    /// (`spec.md` §4.3, §9) instead of being duplicated at each call site.
    fn advertised_window_for_peer(&self) -> u16 {
        let remaining = MAX_NETWORK_BUFFER.saturating_sub(self.receiver.received_len() as u32);
        max(remaining, MSS as u32) as u16
    }
}

/// A connection's shared state, lock, and receive-side condition variable.
/// One `ControlBlock` per connection, held behind an `Arc` by the backend
/// thread, the application thread, and (if present) the timer thread
/// (`spec.md` §5).
pub struct ControlBlock {
    my_port: u16,
    peer_port: u16,
    state: Mutex<ConnectionState>,
    recv_cond: Condvar,
    sink: Arc<dyn DatagramSink>,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl ControlBlock {
    pub fn new(
        my_port: u16,
        peer_port: u16,
        initial_send_seq: SeqNumber,
        initial_recv_seq: SeqNumber,
        sink: Arc<dyn DatagramSink>,
    ) -> Self {
        let state = ConnectionState {
            sender: Sender::new(initial_send_seq),
            receiver: Receiver::new(initial_recv_seq),
            congestion_ctrl: RenoCubic::new(MSS as u32, initial_send_seq),
            advertised_window: MAX_NETWORK_BUFFER as u16,
            stats: ConnectionStats::default(),
        };
        Self {
            my_port,
            peer_port,
            state: Mutex::new(state),
            recv_cond: Condvar::new(),
            sink,
        }
    }

    /// Snapshot of the ambient counters (`spec.md` §7).
    pub fn stats(&self) -> ConnectionStats {
        self.state.lock().unwrap().stats
    }

    pub fn cwnd(&self) -> u32 {
        self.state.lock().unwrap().congestion_ctrl.cwnd()
    }

    pub fn reno_state(&self) -> RenoState {
        self.state.lock().unwrap().congestion_ctrl.reno_state()
    }

    pub fn ssthresh(&self) -> u32 {
        self.state.lock().unwrap().congestion_ctrl.ssthresh()
    }

    //--------------------------------------------------------------------
    // Public core API (spec.md §6)
    //--------------------------------------------------------------------

    /// Appends application bytes to the send window and drives one round of
    /// transmission (`spec.md` §4.3, `send`). The lock is held around both
    /// segmentation and the transmit/drain pair, per `spec.md` §5.
    pub fn send(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut st = self.state.lock().unwrap();
        let next_seq_expected = st.receiver.next_seq_expected();
        let adv_win = st.advertised_window_for_peer();
        st.sender
            .enqueue(data, self.my_port, self.peer_port, next_seq_expected, adv_win);
        self.transmit_and_drain(&mut st);
    }

    /// Entry point for the backend thread: classifies and dispatches one
    /// received datagram (`spec.md` §4.5). Acquires the lock at entry and
    /// releases it at exit, as `spec.md` §5 requires.
    pub fn on_recv_pkt(&self, bytes: &[u8]) {
        let hdr = match TcpHeader::parse(bytes) {
            Ok(hdr) => hdr,
            Err(e) => {
                let mut st = self.state.lock().unwrap();
                st.stats.malformed_dropped += 1;
                log::debug!("dropping malformed packet: {}", e);
                return;
            }
        };

        let mut st = self.state.lock().unwrap();
        st.advertised_window = hdr.advertised_window;

        if hdr.is_ack_only() {
            self.handle_ack(&mut st, hdr.ack);
            return;
        }

        if hdr.payload_len() > 0 {
            let pkt = Bytes::copy_from_slice(bytes);
            st.receiver.add(&hdr, pkt, &mut st.stats);
            st.receiver.process();
            self.recv_cond.notify_all();

            // Pure ACK reply. Per spec.md §9, seq carries `last_byte_sent`
            // (the sender's own cursor), matching the source's
            // `create_packet` call for the ACK reply exactly — not a
            // zero or an echo of the peer's sequence number.
            let ack_hdr = TcpHeader::new(
                self.my_port,
                self.peer_port,
                st.sender.last_byte_sent(),
                st.receiver.next_seq_expected(),
                ACK_FLAG_MASK,
                st.advertised_window_for_peer(),
                0,
            );
            let mut buf = [0u8; TCP_HEADER_SIZE];
            ack_hdr.serialize(&mut buf);
            self.sink.send_datagram(&buf);
            return;
        }

        log::debug!("dropping zero-payload non-ACK packet");
    }

    /// Consumes up to `buf.len()` bytes from the in-order receive stream,
    /// blocking on `recv_cond` until at least one byte is available
    /// (`spec.md` §5, §6).
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut st = self
            .recv_cond
            .wait_while(self.state.lock().unwrap(), |st| {
                st.receiver.received_len() == 0
            })
            .unwrap();
        let data = st.receiver.read(buf.len());
        buf[..data.len()].copy_from_slice(&data);
        data.len()
    }

    /// Called by the external timer on RTO (`spec.md` §4.3, §6). Applies
    /// standard-Reno timeout behavior (§9) and resends the oldest unacked
    /// slot.
    pub fn retransmit_oldest(&self) {
        let mut st = self.state.lock().unwrap();
        st.congestion_ctrl.on_timeout();
        let sink = self.sink.clone();
        if st.sender.retransmit_oldest(|pkt| sink.send_datagram(pkt)) {
            st.stats.rto_timeouts += 1;
            st.stats.retransmissions += 1;
        }
    }

    //--------------------------------------------------------------------
    // Internal helpers
    //--------------------------------------------------------------------

    fn handle_ack(&self, st: &mut ConnectionState, ack: SeqNumber) {
        let outcome = st.congestion_ctrl.on_ack(ack);

        if outcome.retransmit {
            let sink = self.sink.clone();
            if st.sender.retransmit_oldest(|pkt| sink.send_datagram(pkt)) {
                st.stats.retransmissions += 1;
                st.stats.fast_retransmits += 1;
            }
        }

        if outcome.advanced {
            st.sender.drain_acked(st.congestion_ctrl.last_ack_received());
            self.transmit_and_drain(st);
        }
    }

    /// `transmit_send_window` followed by `receive_send_window`
    /// (`spec.md` §4.3): send what the window now allows, then pop
    /// whatever just became fully acknowledged.
    fn transmit_and_drain(&self, st: &mut ConnectionState) {
        let cwnd = st.congestion_ctrl.cwnd();
        let advertised_window = st.advertised_window;
        let last_ack_received = st.congestion_ctrl.last_ack_received();
        let sink = self.sink.clone();
        st.sender
            .transmit(cwnd, advertised_window, last_ack_received, |pkt| {
                sink.send_datagram(pkt)
            });
        st.sender.drain_acked(last_ack_received);
    }
}

