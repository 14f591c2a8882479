// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for encoding / decoding the **frame-control byte** (FCTR) that
//! opens every data-link frame.
//!
//! The byte layout:
//!
//! ```text
//!  7   6   5   4   3   2   1   0      bit position
//! +---+-------+-------+---+-------+
//! | T | resvd |  ACK  | . |  SEQ  |  ← first frame octet
//! +---+-------+-------+---+-------+
//! ```
//!
//! * **T** – frame type. `0` = DATA (carries one packet), `1` = CONTROL
//!   (acknowledgement, or a SYNC/NACK sub-type in the payload).
//! * **ACK** – number of the last peer frame this frame acknowledges.
//! * **SEQ** – number of this frame, modulo the window.
//!
//! Reserved bits are transmitted as zero and ignored on receive.

/// Mask selecting the frame-type bit.
const TYPE_MASK: u8 = 0b1000_0000;
/// Mask selecting the acknowledgement number.
const ACK_MASK: u8 = 0b0001_1000;
/// Mask selecting the sequence number.
const SEQ_MASK: u8 = 0b0000_0011;

const ACK_SHIFT: u8 = 3;

/// Sequence numbers wrap at the window size.
pub const SEQ_MODULO: u8 = 4;

/// Next sequence number after `seq`.
#[inline]
pub fn next_seq(seq: u8) -> u8 {
    (seq + 1) % SEQ_MODULO
}

/// Sequence number delivered just before `seq`.
#[inline]
pub fn prev_seq(seq: u8) -> u8 {
    (seq + SEQ_MODULO - 1) % SEQ_MODULO
}

/// Frame type carried in the high bit of the FCTR.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    #[default]
    Data,
    Control,
}

/// Typed representation of the frame-control byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fctr {
    pub frame_type: FrameType,
    /// Acknowledged peer sequence number (modulo the window).
    pub ack: u8,
    /// Sequence number of this frame (modulo the window).
    pub seq: u8,
}

impl Fctr {
    /// FCTR for a DATA frame carrying `seq` and acknowledging `ack`.
    pub fn data(seq: u8, ack: u8) -> Self {
        Self {
            frame_type: FrameType::Data,
            ack: ack % SEQ_MODULO,
            seq: seq % SEQ_MODULO,
        }
    }

    /// FCTR for a CONTROL frame acknowledging `ack`.
    pub fn control(ack: u8) -> Self {
        Self {
            frame_type: FrameType::Control,
            ack: ack % SEQ_MODULO,
            seq: 0,
        }
    }
}

impl From<u8> for Fctr {
    /// Every byte decodes; reserved bits are masked off.
    fn from(raw: u8) -> Self {
        Self {
            frame_type: if raw & TYPE_MASK != 0 {
                FrameType::Control
            } else {
                FrameType::Data
            },
            ack: (raw & ACK_MASK) >> ACK_SHIFT,
            seq: raw & SEQ_MASK,
        }
    }
}

impl From<&Fctr> for u8 {
    fn from(fctr: &Fctr) -> Self {
        let t = match fctr.frame_type {
            FrameType::Data => 0,
            FrameType::Control => TYPE_MASK,
        };
        t | ((fctr.ack << ACK_SHIFT) & ACK_MASK) | (fctr.seq & SEQ_MASK)
    }
}
