// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! GenKeyPair / CalcSsec / DeriveKey: key generation and agreement.

use anyhow::{Result, ensure};
use bitflags::bitflags;
use bytes::{Bytes, BytesMut};

use crate::{
    commands::{encode_apdu, put_tlv},
    models::{apdu::Command, oid::Oid},
};

/// TLV tag of the target private-key OID.
const TAG_KEY_OID: u8 = 0x01;
/// TLV tag of the key-usage byte.
const TAG_KEY_USAGE: u8 = 0x02;
/// TLV tag of an external public key value.
const TAG_PUBLIC_KEY: u8 = 0x06;
/// TLV tag of the shared-secret source OID.
const TAG_SECRET_OID: u8 = 0x01;
/// TLV tag of the key-derivation seed.
const TAG_DERIVATION_DATA: u8 = 0x02;
/// TLV tag of the requested derived-key length.
const TAG_DERIVED_LEN: u8 = 0x03;

/// Asymmetric algorithms the element can generate keys for.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    EccP256 = 0x03,
    EccP384 = 0x04,
    Rsa1024 = 0x41,
    Rsa2048 = 0x42,
}

bitflags! {
    /// What the generated private key may be used for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyUsage: u8 {
        const AUTHENTICATION = 0x01;
        const ENCRYPTION = 0x02;
        const SIGNING = 0x10;
        const KEY_AGREEMENT = 0x20;
    }
}

/// Generates a key pair into the private-key slot `key`; the response body
/// carries the DER-encoded public part.
pub fn gen_key_pair(algorithm: KeyAlgorithm, usage: KeyUsage, key: Oid) -> Result<Bytes> {
    ensure!(!usage.is_empty(), "a key needs at least one usage");

    let mut body = BytesMut::with_capacity(9);
    put_tlv(&mut body, TAG_KEY_OID, &key.to_be_bytes());
    put_tlv(&mut body, TAG_KEY_USAGE, &[usage.bits()]);
    encode_apdu(Command::GenKeyPair, true, algorithm as u8, &body)
}

/// ECDH: combines the on-chip private key with a peer public key and stores
/// the shared secret in a session context on the element.
pub fn calc_ssec(key: Oid, peer_public_key: &[u8]) -> Result<Bytes> {
    ensure!(!peer_public_key.is_empty(), "peer public key is required");

    let mut body = BytesMut::with_capacity(peer_public_key.len() + 8);
    put_tlv(&mut body, TAG_KEY_OID, &key.to_be_bytes());
    put_tlv(&mut body, TAG_PUBLIC_KEY, peer_public_key);
    // Param 0x01: ECDH per SEC1.
    encode_apdu(Command::CalcSsec, true, 0x01, &body)
}

/// Derives `length` bytes from a stored shared secret with the TLS 1.2 PRF.
pub fn derive_key(secret: Oid, seed: &[u8], length: u16) -> Result<Bytes> {
    ensure!(!seed.is_empty(), "derivation seed is required");
    ensure!(length >= 16, "derived keys shorter than 16 bytes are refused");

    let mut body = BytesMut::with_capacity(seed.len() + 13);
    put_tlv(&mut body, TAG_SECRET_OID, &secret.to_be_bytes());
    put_tlv(&mut body, TAG_DERIVATION_DATA, seed);
    put_tlv(&mut body, TAG_DERIVED_LEN, &length.to_be_bytes());
    // Param 0x01: TLS PRF with SHA-256.
    encode_apdu(Command::DeriveKey, true, 0x01, &body)
}
