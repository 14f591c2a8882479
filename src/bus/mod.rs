// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The two-wire bus boundary.
//!
//! Everything below the physical layer is delegated to an embedder-provided
//! [`TwoWireBus`]: a plain two-wire (I²C-style) master where one call is one
//! START..STOP transaction against a 7-bit peer address. The driver never
//! touches byte-level timing itself; it only composes transactions and
//! retries them.
//!
//! The integration tests ship a complete simulated secure element behind
//! this trait, which is also the recommended starting point for writing a
//! new binding.

use thiserror::Error;

/// Faults a bus implementation may report for a single transaction.
///
/// `Nack` is the only *transient* fault: the element stretches internal busy
/// periods by not acknowledging its address, so the physical layer retries
/// it. Everything else aborts the transaction immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The peer did not acknowledge its address or a data byte.
    #[error("peer did not acknowledge the transaction")]
    Nack,
    /// Any other bus-level fault (arbitration loss, driver error, ...).
    #[error("bus fault: {0}")]
    Other(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// A two-wire master the driver talks through.
pub trait TwoWireBus: Send + 'static {
    /// Writes `bytes` to the peer in a single transaction.
    fn write(
        &mut self,
        addr: u8,
        bytes: &[u8],
    ) -> impl Future<Output = BusResult<()>> + Send;

    /// Fills `buf` from the peer in a single transaction.
    fn read(
        &mut self,
        addr: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = BusResult<()>> + Send;
}
