// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Physical layer: framed register access over the two-wire bus.
//!
//! The element exposes four registers. `DATA` behaves as a frame FIFO: one
//! register transaction moves exactly one frame. `I2C_STATE` is polled for
//! the busy / response-ready bits and carries the byte count of the next
//! readable frame in its low half.

use std::time::Duration;

use bitflags::bitflags;
use bytes::BytesMut;
use tokio::time::{Instant, sleep};

use crate::{
    bus::{BusError, TwoWireBus},
    cfg::config::PhyConfig,
    link::LinkError,
    models::frame::FRAME_OVERHEAD,
};

/// Frame FIFO, read/write, variable length.
pub const DATA_REG: u8 = 0x80;
/// Negotiated data-register window, u16 big-endian.
pub const DATA_REG_LEN_REG: u8 = 0x81;
/// Status word, read-only, u32 big-endian.
pub const I2C_STATE_REG: u8 = 0x82;
/// Soft reset; writing any value restarts the element.
pub const SOFT_RESET_REG: u8 = 0x88;

/// Window the element powers up with.
pub const DEFAULT_DATA_REG_LEN: u16 = 0x40;
/// Smallest window the protocol can operate in.
pub const MIN_DATA_REG_LEN: u16 = 0x10;

bitflags! {
    /// High byte of the status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// The element is executing a command.
        const BUSY = 1 << 31;
        /// A frame is waiting in the data register.
        const RESP_READY = 1 << 30;
        const SOFT_RESET_SUPPORTED = 1 << 27;
        const CONTINUE_READ_SUPPORTED = 1 << 26;
        const REPEATED_START_SUPPORTED = 1 << 25;
        const CLOCK_STRETCHING_SUPPORTED = 1 << 24;
        const PRESENTATION_LAYER_SUPPORTED = 1 << 23;
    }
}

/// Decoded `I2C_STATE` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord {
    pub flags: StatusFlags,
    /// Bytes readable from the data register right now.
    pub read_len: u16,
}

impl StatusWord {
    pub fn from_be_bytes(raw: [u8; 4]) -> Self {
        let word = u32::from_be_bytes(raw);
        Self {
            flags: StatusFlags::from_bits_truncate(word),
            read_len: word as u16,
        }
    }

    #[inline]
    pub fn busy(&self) -> bool {
        self.flags.contains(StatusFlags::BUSY)
    }

    #[inline]
    pub fn data_available(&self) -> bool {
        self.flags.contains(StatusFlags::RESP_READY) && self.read_len > 0
    }
}

/// Register-level access to one element, with NACK retry.
#[derive(Debug)]
pub struct Phy<B> {
    bus: B,
    address: u8,
    cfg: PhyConfig,
    data_reg_len: u16,
    scratch: BytesMut,
}

impl<B: TwoWireBus> Phy<B> {
    pub fn new(bus: B, address: u8, cfg: PhyConfig) -> Self {
        Self {
            bus,
            address,
            cfg,
            data_reg_len: DEFAULT_DATA_REG_LEN,
            scratch: BytesMut::with_capacity(usize::from(DEFAULT_DATA_REG_LEN) + 1),
        }
    }

    /// The register window negotiated by the last [`Phy::init`].
    #[inline]
    pub fn data_reg_len(&self) -> u16 {
        self.data_reg_len
    }

    /// Soft-resets the element, waits for it to come out of busy, and reads
    /// back the data-register window.
    pub async fn init(&mut self) -> Result<(), LinkError> {
        self.reg_write(SOFT_RESET_REG, &[0x00, 0x00]).await?;
        self.wait_ready().await?;

        let mut raw = [0u8; 2];
        self.reg_read(DATA_REG_LEN_REG, &mut raw).await?;
        let len = u16::from_be_bytes(raw);
        if len < MIN_DATA_REG_LEN {
            return Err(LinkError::DataRegLen(len));
        }
        self.data_reg_len = len;
        Ok(())
    }

    /// Writes one frame to the data register in a single transaction. The
    /// data link guarantees the frame fits the negotiated window.
    pub async fn write_data(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        debug_assert!(frame.len() <= usize::from(self.data_reg_len));
        self.reg_write(DATA_REG, frame).await
    }

    /// Polls until a frame is readable (or `deadline` passes), then reads it
    /// into `buf`.
    pub async fn read_data(
        &mut self,
        buf: &mut BytesMut,
        deadline: Duration,
    ) -> Result<(), LinkError> {
        let started = Instant::now();
        let status = loop {
            let status = self.status().await?;
            if status.data_available() {
                break status;
            }
            if started.elapsed() >= deadline {
                return Err(LinkError::PollTimeout(deadline));
            }
            sleep(self.cfg.poll_interval).await;
        };

        let len = usize::from(status.read_len);
        if len < FRAME_OVERHEAD || len > usize::from(self.data_reg_len) {
            return Err(LinkError::ReadLength(len));
        }

        buf.clear();
        buf.resize(len, 0);
        self.reg_read(DATA_REG, &mut buf[..]).await
    }

    /// Reads and decodes the status word.
    pub async fn status(&mut self) -> Result<StatusWord, LinkError> {
        let mut raw = [0u8; 4];
        self.reg_read(I2C_STATE_REG, &mut raw).await?;
        Ok(StatusWord::from_be_bytes(raw))
    }

    /// One register write transaction: `[reg, bytes...]`, NACK-retried.
    pub async fn reg_write(&mut self, reg: u8, bytes: &[u8]) -> Result<(), LinkError> {
        // The transaction is retransmitted verbatim on NACK, so it is staged
        // once in the instance scratch buffer.
        let mut buf = std::mem::take(&mut self.scratch);
        buf.clear();
        buf.extend_from_slice(&[reg]);
        buf.extend_from_slice(bytes);
        let res = self.write_retried(&buf[..]).await;
        self.scratch = buf;
        res
    }

    /// Two-phase register read: select `reg`, then read `buf.len()` bytes.
    /// Each phase is NACK-retried independently.
    pub async fn reg_read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), LinkError> {
        self.write_retried(&[reg]).await?;

        let mut attempt = 0;
        loop {
            match self.bus.read(self.address, buf).await {
                Ok(()) => return Ok(()),
                Err(BusError::Nack) => {
                    attempt += 1;
                    if attempt >= self.cfg.reg_retries {
                        return Err(LinkError::Nack { attempts: attempt });
                    }
                    sleep(self.cfg.retry_delay).await;
                },
                Err(BusError::Other(msg)) => return Err(LinkError::Bus(msg)),
            }
        }
    }

    async fn write_retried(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut attempt = 0;
        loop {
            match self.bus.write(self.address, bytes).await {
                Ok(()) => return Ok(()),
                Err(BusError::Nack) => {
                    attempt += 1;
                    if attempt >= self.cfg.reg_retries {
                        return Err(LinkError::Nack { attempts: attempt });
                    }
                    sleep(self.cfg.retry_delay).await;
                },
                Err(BusError::Other(msg)) => return Err(LinkError::Bus(msg)),
            }
        }
    }

    async fn wait_ready(&mut self) -> Result<(), LinkError> {
        let started = Instant::now();
        loop {
            if !self.status().await?.busy() {
                return Ok(());
            }
            if started.elapsed() >= self.cfg.poll_timeout {
                return Err(LinkError::PollTimeout(self.cfg.poll_timeout));
            }
            sleep(self.cfg.poll_interval).await;
        }
    }
}
