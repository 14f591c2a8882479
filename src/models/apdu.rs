// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! APDU wire format.
//!
//! A request is `{cmd, param, len_be16}` followed by `len` body bytes; a
//! response mirrors it with `{sta, rfu, outlen_be16}`. The transport treats
//! both as opaque byte runs; only the dispatcher looks at the response
//! status byte and the length field.

use hex_literal::hex;
use thiserror::Error;
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16,
    Unaligned,
};

/// Request and response headers are both four bytes.
pub const APDU_HEADER_LEN: usize = 4;

/// Protocol-header limit on a whole APDU. The body length field is 16 bits
/// wide and nothing in the framing constrains an APDU further.
pub const MAX_APDU_LEN: usize = 0xFFFF;

/// Set on the command byte to ask the element to flush its stored error
/// code. The GetErrorCode exchange deliberately leaves it clear so the code
/// it reads survives.
pub const FLUSH_LAST_ERROR: u8 = 0x80;

/// The fixed OpenApplication command issued on every stack reset.
pub const OPEN_APPLICATION: [u8; 20] =
    hex!("F0 00 00 10 D2 76 00 00 04 47 65 6E 41 75 74 68 41 70 70 6C");

/// The response OpenApplication must produce, byte for byte.
pub const OPEN_APPLICATION_OK: [u8; 4] = [0x00; 4];

/// Fixed GetDataObject on the error-code object `0xF1C2`, non-flushing.
pub const GET_ERROR_CODE: [u8; 10] = hex!("01 00 00 06 F1 C2 00 00 00 01");

/// Command codes understood by the element.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetDataObject = 0x01,
    SetDataObject = 0x02,
    SetObjectProtected = 0x03,
    GetRandom = 0x0C,
    EncryptSym = 0x14,
    DecryptSym = 0x15,
    EncryptAsym = 0x1E,
    DecryptAsym = 0x1F,
    CalcHash = 0x30,
    CalcSign = 0x31,
    VerifySign = 0x32,
    CalcSsec = 0x33,
    DeriveKey = 0x34,
    GenKeyPair = 0x38,
    OpenApplication = 0x70,
    CloseApplication = 0x71,
}

impl Command {
    /// The on-wire command byte, optionally flushing the stored error code.
    pub fn code(self, flush_error: bool) -> u8 {
        let c = self as u8;
        if flush_error { c | FLUSH_LAST_ERROR } else { c }
    }
}

/// Request header as it appears on the wire.
#[repr(C)]
#[derive(
    Debug, Default, PartialEq, Eq, ZFromBytes, IntoBytes, KnownLayout, Immutable,
    Unaligned,
)]
pub struct ApduHeader {
    pub cmd: u8,
    pub param: u8,
    pub len: U16<BigEndian>,
}

/// Response header as it appears on the wire.
#[repr(C)]
#[derive(
    Debug, Default, PartialEq, Eq, ZFromBytes, IntoBytes, KnownLayout, Immutable,
    Unaligned,
)]
pub struct RspHeader {
    /// Command status; zero means the element executed the command.
    pub sta: u8,
    rfu: u8,
    pub len: U16<BigEndian>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApduError {
    #[error("response of {0} bytes is shorter than the fixed header")]
    TooShort(usize),
    #[error("response length field says {declared} body bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("malformed response: {0}")]
    Malformed(&'static str),
}

impl RspHeader {
    /// Splits a response into its validated header and body
    /// (`outlen == rx_len − 4`).
    pub fn parse(rx: &[u8]) -> Result<(&Self, &[u8]), ApduError> {
        let (header, body) =
            Self::ref_from_prefix(rx).map_err(|_| ApduError::TooShort(rx.len()))?;
        let declared = usize::from(header.len.get());
        if declared != body.len() {
            return Err(ApduError::LengthMismatch {
                declared,
                actual: body.len(),
            });
        }
        Ok((header, body))
    }
}
