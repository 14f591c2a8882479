// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! GetDataObject / SetDataObject: secure data-object storage and the
//! monotonic counters layered on top of it.

use anyhow::{Result, ensure};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    commands::encode_apdu,
    models::{
        apdu::Command,
        oid::{self, Oid},
    },
};

/// How SetDataObject treats the bytes already stored in the object.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite in place starting at the offset.
    Write = 0x00,
    /// Erase the object, then write from the offset.
    EraseAndWrite = 0x40,
}

/// Reads a whole data object.
pub fn get_data_object(oid: Oid) -> Result<Bytes> {
    encode_apdu(Command::GetDataObject, true, 0x00, &oid.to_be_bytes())
}

/// Reads `length` bytes of a data object starting at `offset`.
pub fn get_data_object_range(oid: Oid, offset: u16, length: u16) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(6);
    body.extend_from_slice(&oid.to_be_bytes());
    body.put_u16(offset);
    body.put_u16(length);
    encode_apdu(Command::GetDataObject, true, 0x00, &body)
}

/// Writes `data` into a data object at `offset`.
pub fn set_data_object(
    oid: Oid,
    mode: WriteMode,
    offset: u16,
    data: &[u8],
) -> Result<Bytes> {
    ensure!(!data.is_empty(), "SetDataObject needs at least one byte");
    let mut body = BytesMut::with_capacity(4 + data.len());
    body.extend_from_slice(&oid.to_be_bytes());
    body.put_u16(offset);
    body.extend_from_slice(data);
    encode_apdu(Command::SetDataObject, true, mode as u8, &body)
}

/// Advances a monotonic counter object. The element rejects the update once
/// the counter's threshold is reached.
pub fn increment_counter(oid: Oid, by: u8) -> Result<Bytes> {
    ensure!(by >= 1, "counter increment must be at least 1");
    let mut body = BytesMut::with_capacity(5);
    body.extend_from_slice(&oid.to_be_bytes());
    body.put_u16(0);
    body.put_u8(by);
    // Param 0x02 selects the count update mode.
    encode_apdu(Command::SetDataObject, true, 0x02, &body)
}

/// Reads the 27-byte coprocessor unique identifier.
pub fn read_chip_id() -> Result<Bytes> {
    get_data_object(oid::COPROCESSOR_UID)
}

/// Reads the stored error code without flushing it. The dispatcher issues
/// the same bytes itself after a non-zero command status.
pub fn read_error_code() -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(6);
    body.extend_from_slice(&oid::LAST_ERROR_CODE.to_be_bytes());
    body.put_u16(0);
    body.put_u16(1);
    encode_apdu(Command::GetDataObject, false, 0x00, &body)
}
