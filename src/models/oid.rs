// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Well-known identifiers of on-chip data objects.

use std::fmt;

/// Two-byte identifier of an on-chip data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(pub u16);

impl Oid {
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

/// Coprocessor unique identifier (27 bytes of chip metadata).
pub const COPROCESSOR_UID: Oid = Oid(0xE0C2);
/// Last command error code, one byte, read by the dispatcher.
pub const LAST_ERROR_CODE: Oid = Oid(0xF1C2);

/// ECC private-key slot 1 (vendor provisioned on Trust M).
pub const ECC_KEY_1: Oid = Oid(0xE0F0);
pub const ECC_KEY_2: Oid = Oid(0xE0F1);
pub const ECC_KEY_3: Oid = Oid(0xE0F2);
pub const ECC_KEY_4: Oid = Oid(0xE0F3);

/// RSA private-key slots.
pub const RSA_KEY_1: Oid = Oid(0xE0FC);
pub const RSA_KEY_2: Oid = Oid(0xE0FD);

/// Public-key certificate slots.
pub const CERTIFICATE_1: Oid = Oid(0xE0E0);
pub const CERTIFICATE_2: Oid = Oid(0xE0E1);
pub const CERTIFICATE_3: Oid = Oid(0xE0E2);
pub const CERTIFICATE_4: Oid = Oid(0xE0E3);

/// Monotonic counters.
pub const COUNTER_1: Oid = Oid(0xE120);
pub const COUNTER_2: Oid = Oid(0xE121);
pub const COUNTER_3: Oid = Oid(0xE122);
pub const COUNTER_4: Oid = Oid(0xE123);
