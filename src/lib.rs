// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! `foggytcp` implements the core of a reliable, in-order, byte-stream
//! transport layered over unreliable datagram delivery.
//!
//! The crate is the per-connection send/receive engine: a sliding-window
//! reliable-delivery state machine coupled with a Reno/CUBIC congestion
//! controller. Connection establishment, the retransmission-timer thread,
//! the RTT estimator, and the datagram socket itself are external
//! collaborators the embedding application supplies (see
//! [`protocols::tcp::established::DatagramSink`]).

pub mod fail;
pub mod protocols;
