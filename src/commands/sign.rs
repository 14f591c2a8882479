// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CalcSign / VerifySign: ECDSA over a host-supplied digest.

use anyhow::{Result, ensure};
use bytes::{Bytes, BytesMut};

use crate::{
    commands::{encode_apdu, put_tlv},
    models::{apdu::Command, oid::Oid},
};

/// ECDSA over a raw digest (FIPS 186, no on-chip hashing).
const ECDSA_RAW: u8 = 0x11;

/// TLV tag of the digest to sign or verify.
const TAG_DIGEST: u8 = 0x01;
/// TLV tag of the signature in a verify request.
const TAG_SIGNATURE: u8 = 0x02;
/// TLV tag of the private-key OID.
const TAG_KEY_OID: u8 = 0x03;
/// TLV tag of the public-key source OID (certificate slot).
const TAG_PUBKEY_OID: u8 = 0x04;

/// Signs `digest` with the on-chip private key `key`. The response body is
/// the ASN.1 DER encoded pair of signature integers.
pub fn calc_sign_ecdsa(digest: &[u8], key: Oid) -> Result<Bytes> {
    ensure!(!digest.is_empty(), "cannot sign an empty digest");
    ensure!(digest.len() <= 64, "digest of {} bytes is oversized", digest.len());

    let mut body = BytesMut::with_capacity(digest.len() + 11);
    put_tlv(&mut body, TAG_DIGEST, digest);
    put_tlv(&mut body, TAG_KEY_OID, &key.to_be_bytes());
    encode_apdu(Command::CalcSign, true, ECDSA_RAW, &body)
}

/// Verifies `signature` over `digest` against the public key stored in the
/// certificate object `pubkey`. The element answers with an empty success
/// body, or a `SignatureVerificationFailure` command error.
pub fn verify_sign_ecdsa(digest: &[u8], signature: &[u8], pubkey: Oid) -> Result<Bytes> {
    ensure!(!digest.is_empty(), "cannot verify an empty digest");
    ensure!(!signature.is_empty(), "cannot verify an empty signature");

    let mut body = BytesMut::with_capacity(digest.len() + signature.len() + 14);
    put_tlv(&mut body, TAG_DIGEST, digest);
    put_tlv(&mut body, TAG_SIGNATURE, signature);
    put_tlv(&mut body, TAG_PUBKEY_OID, &pubkey.to_be_bytes());
    encode_apdu(Command::VerifySign, true, ECDSA_RAW, &body)
}
