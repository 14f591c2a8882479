// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The layered transport stack: physical register access, sequenced frames,
//! and APDU packetisation.
//!
//! Layers report typed [`LinkError`]s upward and never log; the dispatcher
//! worker is the single place where failures become log events and
//! completion outcomes.

use std::time::Duration;

use thiserror::Error;

use crate::models::{frame::FrameError, packet::PacketError};

pub mod data_link;
pub mod phy;
pub mod transport;

/// Failures of the transport stack. Any of these escalates to a stack reset
/// once it reaches the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The peer kept NACKing a register phase past the retry budget.
    #[error("bus NACK persisted after {attempts} attempts")]
    Nack { attempts: u32 },
    /// A non-transient bus fault.
    #[error("bus fault: {0}")]
    Bus(String),
    /// The status register never advertised readable data.
    #[error("no frame became readable within {0:?}")]
    PollTimeout(Duration),
    /// The advertised read length cannot hold a frame or exceeds the window.
    #[error("peer advertised an unframeable read length of {0} bytes")]
    ReadLength(usize),
    /// The negotiated data-register length is outside `0x10..=0xFFFF`.
    #[error("unusable DATA_REG_LEN {0:#06x}")]
    DataRegLen(u16),
    /// A received frame failed structural or checksum validation (reported
    /// after the retransmission budget is spent).
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The peer rejected our frame past the retransmission budget.
    #[error("peer kept rejecting the frame (NACK)")]
    PeerNack,
    /// Sequence numbers no longer line up; a SYNC was emitted.
    #[error("sequence desynchronisation (got {got}, expected {expected})")]
    Desync { got: u8, expected: u8 },
    /// A packet violated chain ordering.
    #[error("packet chain violation: {0}")]
    Chain(&'static str),
    /// The PCTR byte itself was malformed.
    #[error(transparent)]
    Packet(#[from] PacketError),
    /// The reassembled APDU would not fit the caller's buffer.
    #[error("response of {needed} bytes exceeds the caller's capacity of {cap}")]
    Overflow { needed: usize, cap: usize },
    /// An APDU longer than the configured maximum was submitted.
    #[error("APDU of {len} bytes exceeds the configured maximum of {max}")]
    ApduTooLong { len: usize, max: usize },
}

impl LinkError {
    /// Whether the data-link layer may retransmit and try again, or must
    /// escalate immediately.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PollTimeout(_) | Self::ReadLength(_) | Self::Frame(_) | Self::PeerNack
        )
    }
}
