// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CalcHash: SHA-256 on the element.

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};

use crate::{
    commands::{decode_response, encode_apdu, put_tlv},
    models::apdu::Command,
};

pub const SHA256_DIGEST_LEN: usize = 32;

/// Hash algorithm selector carried in the param byte.
const SHA256: u8 = 0xE2;
/// TLV tag for a start-and-finalize message block.
const TAG_MESSAGE_ONLY: u8 = 0x01;
/// TLV tag of the digest in the response.
const TAG_DIGEST: u8 = 0x01;

/// One-shot SHA-256 over a host-supplied message.
pub fn calc_hash_sha256(message: &[u8]) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(3 + message.len());
    put_tlv(&mut body, TAG_MESSAGE_ONLY, message);
    encode_apdu(Command::CalcHash, true, SHA256, &body)
}

/// Extracts the digest from a CalcHash response.
pub fn parse_digest(rx: &[u8]) -> Result<[u8; SHA256_DIGEST_LEN]> {
    let body = decode_response(rx)?;
    let value = strip_tlv(body, TAG_DIGEST).context("CalcHash response")?;
    value
        .try_into()
        .context("digest is not 32 bytes")
}

/// Splits one TLV entry, checking the tag and that nothing trails it.
pub(crate) fn strip_tlv(body: &[u8], tag: u8) -> Result<&[u8]> {
    anyhow::ensure!(body.len() >= 3, "TLV of {} bytes is truncated", body.len());
    anyhow::ensure!(body[0] == tag, "expected tag {tag:#04x}, got {:#04x}", body[0]);
    let len = usize::from(u16::from_be_bytes([body[1], body[2]]));
    anyhow::ensure!(body.len() == 3 + len, "TLV length field disagrees with body");
    Ok(&body[3..])
}
