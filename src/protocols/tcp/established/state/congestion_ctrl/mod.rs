// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod reno_cubic;

pub use reno_cubic::RenoCubic;

use super::RenoState;
use crate::protocols::tcp::SeqNumber;

/// Outcome of feeding an ACK to the congestion controller: what the sender
/// should do as a result, decoupled from the controller's internal state so
/// callers (the ingress classifier) don't need to peek at `reno_state`
/// directly to decide whether to retransmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckOutcome {
    /// A fast retransmit or RTO fired; the sender should resend the oldest
    /// unacked segment.
    pub retransmit: bool,
    /// The ACK was new (not a duplicate, not stale) and advanced the
    /// cumulative cursor.
    pub advanced: bool,
}

/// The Reno/CUBIC congestion-control contract (`spec.md` §4.4). Mirrors the
/// `CongestionControl` trait split in
/// `examples/AidanWoolley-catnip/.../congestion_ctrl/cubic.rs`, simplified
/// to the single controller this core specifies — no `Runtime` type
/// parameter, since the core has no async runtime to abstract over.
pub trait CongestionControl {
    /// Bytes the controller currently permits in flight.
    fn cwnd(&self) -> u32;

    /// Slow-start threshold.
    fn ssthresh(&self) -> u32;

    /// Current Reno phase.
    fn reno_state(&self) -> RenoState;

    /// Number of consecutive ACKs equal to the last cumulative ACK.
    fn dup_ack_count(&self) -> u32;

    /// Highest cumulative ACK value accepted so far (I5: monotonically
    /// non-decreasing under wraparound order).
    fn last_ack_received(&self) -> SeqNumber;

    /// Feeds one incoming ACK to the controller. `last_ack_received` is the
    /// controller's own cumulative-ACK cursor prior to this call; `ack` is
    /// the value carried by the incoming packet.
    fn on_ack(&mut self, ack: SeqNumber) -> AckOutcome;

    /// Standard-Reno timeout response (`spec.md` §4.3, §9): drop to slow
    /// start with `cwnd = MSS`, halve `ssthresh`.
    fn on_timeout(&mut self);
}
