// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Wire encoding for the Foggy TCP packet header (`spec.md` §6). Header
//! parsing is an explicit encode/decode pair, not a raw byte-cast, per the
//! re-architecture note in `spec.md` §9.

use super::{constants::MAX_PACKET_SIZE, seq_number::SeqNumber};
use crate::fail::Fail;
use byteorder::{ByteOrder, NetworkEndian};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Size of the fixed portion of the header, in bytes. No options/extensions
/// are produced by this core; `extension_len` is always `0` on send and
/// ignored (skipped over) on receive.
pub const TCP_HEADER_SIZE: usize = 21;

/// A decoded packet header. `payload` is left to the caller: [`TcpHeader`]
/// carries only the fixed fields, the same split `catnip`'s ARP PDU codec
/// uses between header struct and raw payload slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: SeqNumber,
    pub ack: SeqNumber,
    pub hdr_len: u16,
    pub plen: u16,
    pub flags: u8,
    pub advertised_window: u16,
    pub extension_len: u16,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl TcpHeader {
    /// Builds a header for a data segment (no ACK flag) or a pure ACK
    /// (`payload_len == 0`, [`ACK_FLAG_MASK`](super::constants::ACK_FLAG_MASK) set).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src_port: u16,
        dst_port: u16,
        seq: SeqNumber,
        ack: SeqNumber,
        flags: u8,
        advertised_window: u16,
        payload_len: u16,
    ) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack,
            hdr_len: TCP_HEADER_SIZE as u16,
            plen: TCP_HEADER_SIZE as u16 + payload_len,
            flags,
            advertised_window,
            extension_len: 0,
        }
    }

    /// Payload length implied by `plen - hdr_len`.
    pub fn payload_len(&self) -> u16 {
        self.plen - self.hdr_len
    }

    pub fn is_ack_only(&self) -> bool {
        self.flags == super::constants::ACK_FLAG_MASK
    }

    /// Serializes the header into network byte order.
    pub fn serialize(&self, buf: &mut [u8; TCP_HEADER_SIZE]) {
        NetworkEndian::write_u16(&mut buf[0..2], self.src_port);
        NetworkEndian::write_u16(&mut buf[2..4], self.dst_port);
        NetworkEndian::write_u32(&mut buf[4..8], self.seq.value());
        NetworkEndian::write_u32(&mut buf[8..12], self.ack.value());
        NetworkEndian::write_u16(&mut buf[12..14], self.hdr_len);
        NetworkEndian::write_u16(&mut buf[14..16], self.plen);
        buf[16] = self.flags;
        NetworkEndian::write_u16(&mut buf[17..19], self.advertised_window);
        NetworkEndian::write_u16(&mut buf[19..21], self.extension_len);
    }

    /// Parses a header (and validates it) from the front of `buf`, per the
    /// malformed-packet rules in `spec.md` §7: header too short, `plen <
    /// hdr_len`, or `plen` larger than this build's MTU cap.
    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < TCP_HEADER_SIZE {
            return Err(Fail::Malformed {
                details: "header shorter than minimum header length",
            });
        }
        let src_port = NetworkEndian::read_u16(&buf[0..2]);
        let dst_port = NetworkEndian::read_u16(&buf[2..4]);
        let seq = SeqNumber::new(NetworkEndian::read_u32(&buf[4..8]));
        let ack = SeqNumber::new(NetworkEndian::read_u32(&buf[8..12]));
        let hdr_len = NetworkEndian::read_u16(&buf[12..14]);
        let plen = NetworkEndian::read_u16(&buf[14..16]);
        let flags = buf[16];
        let advertised_window = NetworkEndian::read_u16(&buf[17..19]);
        let extension_len = NetworkEndian::read_u16(&buf[19..21]);

        if (hdr_len as usize) < TCP_HEADER_SIZE {
            return Err(Fail::Malformed {
                details: "hdr_len below minimum header length",
            });
        }
        if plen < hdr_len {
            return Err(Fail::Malformed {
                details: "plen smaller than hdr_len",
            });
        }
        if plen as usize > MAX_PACKET_SIZE {
            return Err(Fail::Malformed {
                details: "plen exceeds this build's MTU cap",
            });
        }
        if buf.len() < plen as usize {
            return Err(Fail::Malformed {
                details: "buffer shorter than plen",
            });
        }

        Ok(Self {
            src_port,
            dst_port,
            seq,
            ack,
            hdr_len,
            plen,
            flags,
            advertised_window,
            extension_len,
        })
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
