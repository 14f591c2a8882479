// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Data-link frame wire format.
//!
//! `| FCTR (1) | LEN (2 BE) | payload (LEN) | FCS (2 BE) |`
//!
//! The FCS is CRC-16 with polynomial `0x1021`, zero init, no reflection and
//! no final XOR (the XMODEM parameterisation), computed over
//! FCTR ∥ LEN ∥ payload and transmitted big-endian. A frame failing the FCS
//! is discarded by the data-link layer.

use bytes::{BufMut, BytesMut};
use crc::{CRC_16_XMODEM, Crc};
use thiserror::Error;
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16,
    Unaligned,
};

use crate::models::fctr::Fctr;

/// FCTR + LEN.
pub const FRAME_HEADER_LEN: usize = 3;
/// Trailing checksum.
pub const FCS_LEN: usize = 2;
/// Header plus checksum; the non-payload bytes of every frame.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_LEN + FCS_LEN;

/// CONTROL payload sub-type: both sides reset their sequence counters.
pub const CONTROL_SYNC: u8 = 0x00;
/// CONTROL payload sub-type: the peer asks for a retransmission.
pub const CONTROL_NACK: u8 = 0x01;

const FCS: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Frame checksum over the already-encoded FCTR ∥ LEN ∥ payload bytes.
#[inline]
pub fn fcs(bytes: &[u8]) -> u16 {
    FCS.checksum(bytes)
}

/// Fixed frame header as it appears on the wire.
#[repr(C)]
#[derive(Debug, Default, ZFromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FrameHeader {
    pub fctr: u8,
    pub len: U16<BigEndian>,
}

/// Reasons a byte run cannot be accepted as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame of {0} bytes is shorter than the fixed overhead")]
    TooShort(usize),
    #[error("frame length field says {declared} payload bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("frame checksum mismatch (got {got:#06x}, want {want:#06x})")]
    Fcs { got: u16, want: u16 },
    #[error("payload of {len} bytes exceeds the register window of {max}")]
    PayloadTooLong { len: usize, max: usize },
    #[error("unknown control sub-type {0:#04x}")]
    BadControl(u8),
}

/// Borrowed view of a validated frame.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub fctr: Fctr,
    pub payload: &'a [u8],
}

/// What a CONTROL frame asks of the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Empty payload: plain acknowledgement of the FCTR ack number.
    Ack,
    /// Reset sequence counters on both sides.
    Sync,
    /// Retransmit the last frame.
    Nack,
}

impl ControlKind {
    /// Classifies a CONTROL frame payload.
    pub fn classify(payload: &[u8]) -> Result<Self, FrameError> {
        match payload {
            [] => Ok(Self::Ack),
            [CONTROL_SYNC] => Ok(Self::Sync),
            [CONTROL_NACK] => Ok(Self::Nack),
            [other, ..] => Err(FrameError::BadControl(*other)),
        }
    }

    /// The payload this sub-type is carried in.
    pub fn payload(self) -> &'static [u8] {
        match self {
            Self::Ack => &[],
            Self::Sync => &[CONTROL_SYNC],
            Self::Nack => &[CONTROL_NACK],
        }
    }
}

/// Encodes one frame into `out` (cleared first).
///
/// `max_frame` is the negotiated register window; the encoded frame never
/// exceeds it.
pub fn encode(
    fctr: Fctr,
    payload: &[u8],
    max_frame: usize,
    out: &mut BytesMut,
) -> Result<(), FrameError> {
    let total = FRAME_OVERHEAD + payload.len();
    if total > max_frame {
        return Err(FrameError::PayloadTooLong {
            len: payload.len(),
            max: max_frame.saturating_sub(FRAME_OVERHEAD),
        });
    }

    out.clear();
    out.reserve(total);
    out.put_u8(u8::from(&fctr));
    out.put_u16(payload.len() as u16);
    out.extend_from_slice(payload);
    let sum = fcs(&out[..]);
    out.put_u16(sum);
    Ok(())
}

/// Parses and validates one frame: length consistency first, then the FCS.
pub fn parse(bytes: &[u8]) -> Result<FrameView<'_>, FrameError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(FrameError::TooShort(bytes.len()));
    }

    let (header, rest) = FrameHeader::ref_from_prefix(bytes)
        .map_err(|_| FrameError::TooShort(bytes.len()))?;
    let declared = usize::from(header.len.get());
    let actual = rest.len() - FCS_LEN;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let body_end = bytes.len() - FCS_LEN;
    let want = fcs(&bytes[..body_end]);
    let got = u16::from_be_bytes([bytes[body_end], bytes[body_end + 1]]);
    if got != want {
        return Err(FrameError::Fcs { got, want });
    }

    Ok(FrameView {
        fctr: Fctr::from(header.fctr),
        payload: &rest[..actual],
    })
}
