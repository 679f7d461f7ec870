// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Protocol constants. Fixed per build, not exposed through any
//! configuration surface (`spec.md` §6).

/// Maximum segment payload, in bytes.
pub const MSS: u16 = 1400;

/// Ceiling on the advertised receive window. Capped at `u16::MAX` since the
/// wire field (`spec.md` §6) is 16 bits wide.
pub const MAX_NETWORK_BUFFER: u32 = u16::MAX as u32;

/// Out-of-order reassembly capacity: number of MSS-sized slots held by the
/// receive window.
pub const RECEIVE_WINDOW_SLOT_SIZE: usize = 64;

/// Set on header-only acknowledgement packets.
pub const ACK_FLAG_MASK: u8 = 0x01;

/// Reserved for connection establishment; not produced or consumed by this
/// core (handshake is out of scope, `spec.md` §1).
pub const SYN_FLAG_MASK: u8 = 0x02;

/// Reserved for connection teardown; not produced or consumed by this core.
pub const FIN_FLAG_MASK: u8 = 0x04;

/// Largest packet this core will accept off the wire before treating it as
/// malformed.
pub const MAX_PACKET_SIZE: usize = crate::protocols::tcp::header::TCP_HEADER_SIZE + MSS as usize;
