// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! End-to-end scenario tests driving [`ControlBlock`] the way the six
//! concrete scenarios in `spec.md` §8 describe: a clean in-order stream, a
//! triple duplicate ACK and the fast retransmit/recovery it triggers, and an
//! RTO-driven retransmission. Out-of-order reassembly, stale/beyond-window
//! drops, and sequence-number wraparound are already covered at the unit
//! level in `receiver.rs` and `seq_number.rs`; this module is the level
//! above, exercising the pieces wired together behind one lock.

use super::{
    control_block::DatagramSink,
    ControlBlock,
};
use crate::protocols::tcp::{
    constants::ACK_FLAG_MASK,
    header::{TcpHeader, TCP_HEADER_SIZE},
    seq_number::SeqNumber,
    constants::MSS,
};
use std::sync::{Arc, Mutex};

use super::state::RenoState;

/// Records every datagram handed to it instead of delivering it anywhere.
/// Tests drain the recording and feed packets to the peer explicitly,
/// between calls, so a reply never runs back into a lock its own causal
/// chain is still holding (`ControlBlock::send`/`on_recv_pkt` each acquire
/// the connection mutex for their own duration only).
struct RecordingSink {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl DatagramSink for RecordingSink {
    fn send_datagram(&self, bytes: &[u8]) {
        self.sent.lock().unwrap().push(bytes.to_vec());
    }
}

fn ack_packet(src_port: u16, dst_port: u16, ack: SeqNumber, advertised_window: u16) -> Vec<u8> {
    let hdr = TcpHeader::new(
        src_port,
        dst_port,
        SeqNumber::new(0),
        ack,
        ACK_FLAG_MASK,
        advertised_window,
        0,
    );
    let mut buf = [0u8; TCP_HEADER_SIZE];
    hdr.serialize(&mut buf);
    buf.to_vec()
}

fn payload_len_of(pkt: &[u8]) -> u32 {
    (pkt.len() - TCP_HEADER_SIZE) as u32
}

/// Scenario 1: a short clean stream, delivered in order, with every ACK
/// round-tripped by hand between two `ControlBlock`s.
#[test]
fn clean_stream_round_trips_end_to_end() {
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let cb_a = ControlBlock::new(100, 200, SeqNumber::new(1000), SeqNumber::new(0), sink_a.clone());
    let cb_b = ControlBlock::new(200, 100, SeqNumber::new(0), SeqNumber::new(1000), sink_b.clone());

    cb_a.send(b"hello, foggy world");

    let from_a = sink_a.drain();
    assert_eq!(from_a.len(), 1);
    for pkt in &from_a {
        cb_b.on_recv_pkt(pkt);
    }

    let mut buf = [0u8; 64];
    let n = cb_b.read(&mut buf);
    assert_eq!(&buf[..n], b"hello, foggy world");

    // The data delivery produced a pure-ACK reply; feed it back so cb_a's
    // send window advances and nothing is left outstanding.
    let from_b = sink_b.drain();
    assert_eq!(from_b.len(), 1);
    for pkt in &from_b {
        cb_a.on_recv_pkt(pkt);
    }

    let stats_a = cb_a.stats();
    assert_eq!(stats_a.malformed_dropped, 0);
    let stats_b = cb_b.stats();
    assert_eq!(stats_b.stale_dropped, 0);
    assert_eq!(stats_b.out_of_window_dropped, 0);
    assert_eq!(stats_b.duplicate_dropped, 0);
}

/// Scenarios 2 and 3: growing the window through slow start until several
/// segments are outstanding, a triple duplicate ACK firing fast retransmit,
/// and the subsequent new cumulative ACK exiting fast recovery into
/// congestion avoidance.
#[test]
fn triple_duplicate_ack_triggers_fast_retransmit_then_exits_to_congestion_avoidance() {
    let sink = RecordingSink::new();
    let initial_seq = SeqNumber::new(1000);
    let cb = ControlBlock::new(100, 200, initial_seq, SeqNumber::new(0), sink.clone());

    let data = vec![0xABu8; MSS as usize * 12];
    cb.send(&data);

    // Slow start: only the first MSS goes out at cwnd == MSS.
    let first = sink.drain();
    assert_eq!(first.len(), 1);

    // Ack the growth forward a few rounds so more than one segment ends up
    // outstanding before the loss. Each round's ACK covers exactly the
    // previous round's batch (`fed_ack`); `next_ack` — covering the batch
    // that round itself sends — isn't fed until the following round, so
    // the last round's batch is left outstanding and unacknowledged.
    let mut next_ack = initial_seq + payload_len_of(&first[0]);
    let mut fed_ack = next_ack;
    for _ in 0..3 {
        fed_ack = next_ack;
        cb.on_recv_pkt(&ack_packet(200, 100, fed_ack, 8192));
        let batch = sink.drain();
        assert!(!batch.is_empty(), "slow start should keep sending while cwnd grows");
        let batch_bytes: u32 = batch.iter().map(|pkt| payload_len_of(pkt)).sum();
        next_ack = fed_ack + batch_bytes;
    }
    assert_eq!(cb.reno_state(), RenoState::SlowStart);

    // The batch sent in response to the last ACK above is now outstanding;
    // the peer keeps re-acknowledging the cumulative point before it, as if
    // that batch's first segment never arrived.
    let cwnd_before_loss = cb.cwnd();
    let ack_value = fed_ack;

    cb.on_recv_pkt(&ack_packet(200, 100, ack_value, 8192)); // 1st duplicate
    assert!(sink.drain().is_empty());
    cb.on_recv_pkt(&ack_packet(200, 100, ack_value, 8192)); // 2nd duplicate
    assert!(sink.drain().is_empty());

    cb.on_recv_pkt(&ack_packet(200, 100, ack_value, 8192)); // 3rd duplicate
    let after_third = sink.drain();
    assert_eq!(after_third.len(), 1, "the 3rd duplicate ACK retransmits exactly the oldest unacked segment");
    let resent_hdr = TcpHeader::parse(&after_third[0]).unwrap();
    assert_eq!(resent_hdr.seq, ack_value);

    assert_eq!(cb.reno_state(), RenoState::FastRecovery);
    assert_eq!(cb.stats().fast_retransmits, 1);
    assert_eq!(cb.stats().retransmissions, 1);
    assert!(cb.ssthresh() < cwnd_before_loss);
    assert_eq!(cb.cwnd(), cb.ssthresh() + 3 * MSS as u32);

    // A new cumulative ACK covering the retransmitted segment exits fast
    // recovery straight into congestion avoidance (spec.md scenario 3).
    let ssthresh = cb.ssthresh();
    let recovery_ack = ack_value + MSS as u32;
    cb.on_recv_pkt(&ack_packet(200, 100, recovery_ack, 8192));
    assert_eq!(cb.reno_state(), RenoState::CongestionAvoidance);
    assert_eq!(cb.cwnd(), ssthresh);
}

/// An RTO fires through the external timer hook: cwnd collapses to one MSS
/// and the oldest unacked segment goes out again.
#[test]
fn retransmission_timeout_resets_to_slow_start_and_resends_head_of_line() {
    let sink = RecordingSink::new();
    let initial_seq = SeqNumber::new(500);
    let cb = ControlBlock::new(100, 200, initial_seq, SeqNumber::new(0), sink.clone());

    cb.send(&vec![0xCDu8; MSS as usize * 3]);
    sink.drain();

    cb.retransmit_oldest();
    let resent = sink.drain();
    assert_eq!(resent.len(), 1);
    let hdr = TcpHeader::parse(&resent[0]).unwrap();
    assert_eq!(hdr.seq, initial_seq);

    assert_eq!(cb.reno_state(), RenoState::SlowStart);
    assert_eq!(cb.cwnd(), MSS as u32);
    assert_eq!(cb.stats().rto_timeouts, 1);
    assert_eq!(cb.stats().retransmissions, 1);
}
