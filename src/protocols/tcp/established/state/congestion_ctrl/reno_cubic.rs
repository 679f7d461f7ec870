// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use super::{AckOutcome, CongestionControl};
use crate::protocols::tcp::{
    seq_number::{after, before},
    SeqNumber,
};
use std::{
    cmp::max,
    time::{Duration, Instant},
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Reno fast-retransmit + CUBIC congestion-avoidance controller
/// (`spec.md` §4.4), grounded directly on
/// `examples/original_source/enhanced_cca/foggytcp/src/foggy_function.cc`'s
/// `handle_ack`/`cubic_update`, with the state split into a dedicated type
/// the way `catnip`'s `Cubic` (in
/// `examples/AidanWoolley-catnip/.../congestion_ctrl/cubic.rs`) separates
/// congestion control from the sender it drives.
#[derive(Debug)]
pub struct RenoCubic {
    mss: u32,
    cwnd: u32,
    ssthresh: u32,
    reno_state: super::RenoState,
    dup_ack_count: u32,
    last_ack_received: SeqNumber,

    /// CWND recorded at the most recent loss; CUBIC's inflection point.
    w_max: u32,
    /// Monotonic timestamp of the most recent fast-retransmit event. Seeded
    /// to the controller's construction time rather than a zero epoch: an
    /// opaque `std::time::Instant` has no representable "start of time", and
    /// seeding at construction keeps `t` in `cubic_update` bounded by
    /// connection age instead of host uptime.
    last_loss_time: Instant,
    cubic_c: f64,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl RenoCubic {
    const BETA: f64 = 0.7;
    const DUP_ACK_THRESHOLD: u32 = 3;
    const DEFAULT_CUBIC_C: f64 = 0.4;

    /// Creates a fresh controller for a connection whose initial send
    /// sequence number is `initial_seq_no`. `ssthresh` starts "arbitrarily
    /// high" per RFC 5681 §3.1 so the first loss event is what establishes
    /// it, matching the source's implicit assumption that slow start runs
    /// unbounded until the first fast retransmit.
    pub fn new(mss: u32, initial_seq_no: SeqNumber) -> Self {
        Self {
            mss,
            cwnd: mss,
            ssthresh: u32::MAX,
            reno_state: super::RenoState::SlowStart,
            dup_ack_count: 0,
            last_ack_received: initial_seq_no,
            w_max: 0,
            last_loss_time: Instant::now(),
            cubic_c: Self::DEFAULT_CUBIC_C,
        }
    }

    /// CUBIC window growth for one new ACK in congestion avoidance
    /// (`spec.md` §4.4). Operates on raw byte counts, matching the
    /// original's un-normalized arithmetic rather than `catnip`'s
    /// MSS-normalized `Cubic::w_cubic`.
    fn cubic_update(&self, now: Instant) -> u32 {
        let w_max_eff = if self.w_max == 0 {
            2 * self.cwnd
        } else {
            self.w_max
        } as f64;
        let cwnd = self.cwnd as f64;
        let mss = self.mss as f64;

        let t = now
            .checked_duration_since(self.last_loss_time)
            .unwrap_or_else(|| Duration::from_secs(0))
            .as_secs_f64();
        let k = ((w_max_eff - cwnd) / self.cubic_c).cbrt();

        let w_cubic = self.cubic_c * (t - k).powi(3) + w_max_eff;
        let w_tcp = cwnd + mss / cwnd;

        let new_cwnd = w_cubic.max(w_tcp).max(cwnd).max(mss);
        new_cwnd as u32
    }

    fn enter_fast_recovery(&mut self, now: Instant) -> AckOutcome {
        self.w_max = self.cwnd;
        self.ssthresh = max((self.cwnd as f64 * Self::BETA) as u32, self.mss);
        self.cwnd = self.ssthresh + 3 * self.mss;
        self.reno_state = super::RenoState::FastRecovery;
        self.last_loss_time = now;
        log::debug!(
            "fast retransmit: cwnd={} ssthresh={} w_max={}",
            self.cwnd,
            self.ssthresh,
            self.w_max
        );
        AckOutcome {
            retransmit: true,
            advanced: false,
        }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl CongestionControl for RenoCubic {
    fn cwnd(&self) -> u32 {
        self.cwnd
    }

    fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    fn reno_state(&self) -> super::RenoState {
        self.reno_state
    }

    fn dup_ack_count(&self) -> u32 {
        self.dup_ack_count
    }

    fn last_ack_received(&self) -> SeqNumber {
        self.last_ack_received
    }

    fn on_ack(&mut self, ack: SeqNumber) -> AckOutcome {
        let now = Instant::now();

        if ack == self.last_ack_received {
            self.dup_ack_count += 1;

            if self.dup_ack_count == Self::DUP_ACK_THRESHOLD {
                self.enter_fast_recovery(now)
            } else if self.dup_ack_count > Self::DUP_ACK_THRESHOLD
                && self.reno_state == super::RenoState::FastRecovery
            {
                self.cwnd += self.mss;
                AckOutcome {
                    retransmit: false,
                    advanced: false,
                }
            } else {
                AckOutcome {
                    retransmit: false,
                    advanced: false,
                }
            }
        } else if after(ack, self.last_ack_received) {
            self.dup_ack_count = 0;

            match self.reno_state {
                super::RenoState::FastRecovery => {
                    self.cwnd = self.ssthresh;
                    self.reno_state = super::RenoState::CongestionAvoidance;
                    log::debug!("exiting fast recovery: cwnd={}", self.cwnd);
                }
                super::RenoState::SlowStart => {
                    self.cwnd += self.mss;
                    if self.cwnd >= self.ssthresh {
                        self.reno_state = super::RenoState::CongestionAvoidance;
                        log::debug!("entering congestion avoidance: cwnd={}", self.cwnd);
                    }
                }
                super::RenoState::CongestionAvoidance => {
                    self.cwnd = self.cubic_update(now);
                }
            }

            self.last_ack_received = ack;
            AckOutcome {
                retransmit: false,
                advanced: true,
            }
        } else {
            debug_assert!(before(ack, self.last_ack_received));
            AckOutcome {
                retransmit: false,
                advanced: false,
            }
        }
    }

    fn on_timeout(&mut self) {
        log::warn!("retransmission timeout: cwnd={} -> {}", self.cwnd, self.mss);
        self.reno_state = super::RenoState::SlowStart;
        self.ssthresh = max(self.cwnd / 2, self.mss);
        self.cwnd = self.mss;
        self.dup_ack_count = 0;
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mss() -> u32 {
        1400
    }

    #[test]
    fn slow_start_grows_by_one_mss_per_ack() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        let start = cc.cwnd();
        let outcome = cc.on_ack(SeqNumber::new(1000 + mss()));
        assert!(outcome.advanced);
        assert!(!outcome.retransmit);
        assert_eq!(cc.cwnd(), start + mss());
        assert_eq!(cc.reno_state(), super::super::RenoState::SlowStart);
    }

    #[test]
    fn floor_invariants_hold_after_timeout() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(0));
        cc.on_timeout();
        assert!(cc.cwnd() >= mss());
        assert!(cc.ssthresh() >= mss());
        assert_eq!(cc.reno_state(), super::super::RenoState::SlowStart);
    }

    #[test]
    fn triple_dup_ack_triggers_fast_retransmit() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        // advance into a known cwnd first.
        cc.on_ack(SeqNumber::new(1000 + mss()));
        let cwnd_before_loss = cc.cwnd();
        let base = SeqNumber::new(1000 + mss());

        assert!(!cc.on_ack(base).retransmit); // 1st dup
        assert!(!cc.on_ack(base).retransmit); // 2nd dup
        let third = cc.on_ack(base); // 3rd dup: fast retransmit
        assert!(third.retransmit);
        assert_eq!(cc.reno_state(), super::super::RenoState::FastRecovery);
        assert_eq!(
            cc.ssthresh(),
            max((cwnd_before_loss as f64 * RenoCubic::BETA) as u32, mss())
        );
        assert_eq!(cc.cwnd(), cc.ssthresh() + 3 * mss());
    }

    #[test]
    fn fourth_dup_ack_inflates_window_only_in_fast_recovery() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        let base = SeqNumber::new(1000);
        cc.on_ack(base);
        cc.on_ack(base);
        cc.on_ack(base); // fast retransmit fires here.
        let cwnd_after_fr = cc.cwnd();
        cc.on_ack(base); // 4th dup: window inflation.
        assert_eq!(cc.cwnd(), cwnd_after_fr + mss());
    }

    #[test]
    fn fast_recovery_exit_resets_to_ssthresh() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        let base = SeqNumber::new(1000);
        cc.on_ack(base);
        cc.on_ack(base);
        cc.on_ack(base); // enters fast recovery
        let ssthresh = cc.ssthresh();
        let outcome = cc.on_ack(SeqNumber::new(1000 + 5 * mss()));
        assert!(outcome.advanced);
        assert_eq!(cc.cwnd(), ssthresh);
        assert_eq!(cc.dup_ack_count(), 0);
        assert_eq!(
            cc.reno_state(),
            super::super::RenoState::CongestionAvoidance
        );
    }

    #[test]
    fn old_ack_is_ignored() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        cc.on_ack(SeqNumber::new(1000 + mss()));
        let cwnd = cc.cwnd();
        let state = cc.reno_state();
        let outcome = cc.on_ack(SeqNumber::new(1000));
        assert!(!outcome.advanced);
        assert!(!outcome.retransmit);
        assert_eq!(cc.cwnd(), cwnd);
        assert_eq!(cc.reno_state(), state);
    }

    #[test]
    fn cwnd_never_shrinks_below_mss_during_congestion_avoidance() {
        let mut cc = RenoCubic::new(mss(), SeqNumber::new(1000));
        // Drive into congestion avoidance quickly by shrinking ssthresh via loss.
        let base = SeqNumber::new(1000);
        cc.on_ack(base);
        cc.on_ack(base);
        cc.on_ack(base); // fast recovery
        cc.on_ack(SeqNumber::new(1000 + 5 * mss())); // exit to CA
        for i in 0..20 {
            let ack = SeqNumber::new(1000 + 5 * mss() + (i + 1) * mss());
            cc.on_ack(ack);
            assert!(cc.cwnd() >= mss());
        }
    }
}
