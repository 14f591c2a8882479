// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command encoders: builders that turn typed requests into APDU bytes and
//! decoders that pick the payload out of response APDUs.
//!
//! The transport stack never looks inside these bodies; everything here is
//! the boundary the dispatcher carries opaquely. Requests flush the
//! element's stored error code by default (command high bit), exactly like
//! the vendor host library does, so a stale code never shadows a fresh one.

pub mod data_object;
pub mod hash;
pub mod key;
pub mod random;
pub mod sign;

use anyhow::{Result, ensure};
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{IntoBytes, U16};

use crate::models::apdu::{
    APDU_HEADER_LEN, ApduHeader, Command, OPEN_APPLICATION, RspHeader,
};

/// Assembles `{cmd, param, len}` + body into a ready-to-submit APDU.
pub(crate) fn encode_apdu(
    cmd: Command,
    flush_error: bool,
    param: u8,
    body: &[u8],
) -> Result<Bytes> {
    ensure!(
        body.len() <= usize::from(u16::MAX),
        "APDU body of {} bytes exceeds the length field",
        body.len()
    );

    let header = ApduHeader {
        cmd: cmd.code(flush_error),
        param,
        len: U16::new(body.len() as u16),
    };

    let mut buf = BytesMut::with_capacity(APDU_HEADER_LEN + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body);
    Ok(buf.freeze())
}

/// Validates a response header and returns the body.
pub fn decode_response(rx: &[u8]) -> Result<&[u8]> {
    let (header, body) = RspHeader::parse(rx)?;
    ensure!(
        header.sta == 0,
        "response carries command status {:#04x}",
        header.sta
    );
    Ok(body)
}

/// Appends one tag-length-value entry to a body under construction.
pub(crate) fn put_tlv(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    buf.put_u8(tag);
    buf.put_u16(value.len() as u16);
    buf.extend_from_slice(value);
}

/// OpenApplication with a clean context, byte-identical to the image the
/// dispatcher replays on every reset. Useful for liveness probes.
pub fn open_application() -> Bytes {
    Bytes::from_static(&OPEN_APPLICATION)
}

/// CloseApplication: tears down the application context (and with it any
/// session material) without a bus-level reset.
pub fn close_application() -> Result<Bytes> {
    encode_apdu(Command::CloseApplication, true, 0x00, &[])
}
