// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Wraparound-safe arithmetic over 32-bit TCP sequence numbers.

use std::{
    fmt,
    num::Wrapping,
    ops::{Add, Sub},
};

//==============================================================================
// Structures
//==============================================================================

/// A 32-bit sequence number that wraps and compares using signed-difference
/// semantics rather than the natural unsigned order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SeqNumber(pub Wrapping<u32>);

//==============================================================================
// Associate Functions
//==============================================================================

impl SeqNumber {
    /// Creates a sequence number from a raw `u32`.
    pub fn new(value: u32) -> Self {
        Self(Wrapping(value))
    }

    /// Returns the raw `u32` value.
    pub fn value(self) -> u32 {
        (self.0).0
    }
}

//==============================================================================
// Free Functions
//==============================================================================

/// `before(a, b)` holds iff `a` precedes `b` in sequence-number order,
/// accounting for 32-bit wraparound: `(i32)(a - b) < 0`.
pub fn before(a: SeqNumber, b: SeqNumber) -> bool {
    ((a.0 - b.0).0 as i32) < 0
}

/// `after(a, b) == before(b, a)`.
pub fn after(a: SeqNumber, b: SeqNumber) -> bool {
    before(b, a)
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Adding a byte count to a sequence number advances it (with wraparound).
impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0 + Wrapping(rhs))
    }
}

/// The signed distance between two sequence numbers, in wrapped `u32` space.
/// Callers on the "forward" side (`after(a, b)`) get the positive byte
/// count; used by the congestion controller to compute bytes-acknowledged.
impl Sub for SeqNumber {
    type Output = Wrapping<u32>;

    fn sub(self, rhs: SeqNumber) -> Wrapping<u32> {
        self.0 - rhs.0
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SeqNumber({})", (self.0).0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", (self.0).0)
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
