// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! GetRandom: random bytes from the element's generators.

use anyhow::{Result, ensure};
use bytes::Bytes;

use crate::{commands::encode_apdu, models::apdu::Command};

/// The element refuses requests below this size.
pub const MIN_RANDOM_LEN: u16 = 8;
/// Largest run one GetRandom may return.
pub const MAX_RANDOM_LEN: u16 = 256;

/// Which generator serves the request.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngKind {
    /// True random number generator.
    Trng = 0x00,
    /// Deterministic generator seeded by the TRNG.
    Drng = 0x01,
}

/// Requests `length` random bytes.
pub fn get_random(kind: RngKind, length: u16) -> Result<Bytes> {
    ensure!(
        (MIN_RANDOM_LEN..=MAX_RANDOM_LEN).contains(&length),
        "random length {length} outside {MIN_RANDOM_LEN}..={MAX_RANDOM_LEN}"
    );
    encode_apdu(Command::GetRandom, true, kind as u8, &length.to_be_bytes())
}
