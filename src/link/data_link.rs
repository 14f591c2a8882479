// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Data-link layer: reliable, in-order, single-in-flight frame delivery.
//!
//! Stop-and-wait with a window of one. Every DATA frame piggybacks an
//! acknowledgement of the last delivered peer frame; on top of that an
//! explicit CONTROL acknowledgement is sent after every delivery, matching
//! the element's half-duplex turn-taking. A DATA frame that arrives while we
//! are still waiting for our own frame to be acknowledged is stashed and
//! handed to the next receive.

use std::ops::Range;

use bytes::{Bytes, BytesMut};

use crate::{
    bus::TwoWireBus,
    cfg::config::LinkConfig,
    link::{LinkError, phy::Phy},
    models::{
        fctr::{self, Fctr, FrameType},
        frame::{self, ControlKind, FRAME_HEADER_LEN, FRAME_OVERHEAD},
    },
};

#[derive(Debug)]
pub struct DataLink<B> {
    phy: Phy<B>,
    cfg: LinkConfig,
    /// Sequence number the next transmitted DATA frame will carry.
    tx_seq: u8,
    /// Sequence number expected on the next delivered peer frame.
    rx_seq: u8,
    /// Last delivered peer sequence, piggybacked on outgoing DATA frames.
    rx_ack: u8,
    /// Encoded copy of the last DATA frame, kept for retransmission.
    last_tx: BytesMut,
    /// DATA frame received while waiting for an acknowledgement.
    pending: Option<BytesMut>,
    scratch: BytesMut,
}

impl<B: TwoWireBus> DataLink<B> {
    pub fn new(phy: Phy<B>, cfg: LinkConfig) -> Self {
        Self {
            phy,
            cfg,
            tx_seq: 0,
            rx_seq: 0,
            rx_ack: 0,
            last_tx: BytesMut::new(),
            pending: None,
            scratch: BytesMut::new(),
        }
    }

    #[inline]
    pub fn phy(&self) -> &Phy<B> {
        &self.phy
    }

    #[inline]
    pub fn phy_mut(&mut self) -> &mut Phy<B> {
        &mut self.phy
    }

    /// Emits a SYNC frame and zeroes the sequence state on our side.
    pub async fn init(&mut self) -> Result<(), LinkError> {
        self.reset_counters();
        self.emit_control(ControlKind::Sync, 0).await
    }

    /// Sends one packet as a DATA frame and waits until the peer has
    /// acknowledged it (explicitly or by piggyback).
    pub async fn send(&mut self, packet: &[u8]) -> Result<(), LinkError> {
        let window = usize::from(self.phy.data_reg_len());
        let mut out = std::mem::take(&mut self.last_tx);
        let encoded =
            frame::encode(Fctr::data(self.tx_seq, self.rx_ack), packet, window, &mut out);
        self.last_tx = out;
        encoded?;

        self.phy_write_last_tx().await?;
        self.wait_tx_ack().await
    }

    /// Receives the next DATA payload, acknowledging it and filtering out
    /// control traffic and duplicates.
    pub async fn recv(&mut self) -> Result<Bytes, LinkError> {
        let mut failures = 0u32;
        loop {
            let (fctr, body) = match self.next_frame().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.note_failure(&mut failures, e).await?;
                    continue;
                },
            };

            match fctr.frame_type {
                FrameType::Control => {
                    match ControlKind::classify(&self.scratch[body])? {
                        // Stray acknowledgement; nothing is in flight.
                        ControlKind::Ack => {},
                        ControlKind::Nack => {
                            self.note_failure(&mut failures, LinkError::PeerNack)
                                .await?;
                        },
                        ControlKind::Sync => {
                            let expected = self.rx_seq;
                            self.reset_counters();
                            return Err(LinkError::Desync { got: 0, expected });
                        },
                    }
                },
                FrameType::Data => {
                    if fctr.seq == self.rx_seq {
                        self.rx_ack = fctr.seq;
                        self.rx_seq = fctr::next_seq(self.rx_seq);
                        self.emit_control(ControlKind::Ack, self.rx_ack).await?;
                        let payload = self.scratch.split().freeze();
                        return Ok(payload.slice(body));
                    }
                    if fctr.seq == fctr::prev_seq(self.rx_seq) {
                        // Peer retransmission of an already-delivered frame.
                        self.emit_control(ControlKind::Ack, fctr.seq).await?;
                        continue;
                    }
                    let expected = self.rx_seq;
                    self.emit_control(ControlKind::Sync, self.rx_ack).await?;
                    self.reset_counters();
                    return Err(LinkError::Desync { got: fctr.seq, expected });
                },
            }
        }
    }

    /// Waits for the peer to acknowledge `tx_seq`.
    async fn wait_tx_ack(&mut self) -> Result<(), LinkError> {
        let mut failures = 0u32;
        loop {
            let (fctr, body) = match self.read_frame().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.note_failure(&mut failures, e).await?;
                    continue;
                },
            };

            match fctr.frame_type {
                FrameType::Control => {
                    match ControlKind::classify(&self.scratch[body])? {
                        ControlKind::Ack if fctr.ack == self.tx_seq => {
                            self.tx_seq = fctr::next_seq(self.tx_seq);
                            return Ok(());
                        },
                        // An acknowledgement of an older frame; keep waiting.
                        ControlKind::Ack => {},
                        ControlKind::Nack => {
                            self.note_failure(&mut failures, LinkError::PeerNack)
                                .await?;
                        },
                        ControlKind::Sync => {
                            let expected = self.rx_seq;
                            self.reset_counters();
                            return Err(LinkError::Desync { got: 0, expected });
                        },
                    }
                },
                FrameType::Data => {
                    if fctr.ack == self.tx_seq {
                        // The response is already arriving; its piggyback ack
                        // covers our frame. Hold it for the next receive.
                        self.tx_seq = fctr::next_seq(self.tx_seq);
                        self.pending = Some(self.scratch.split());
                        return Ok(());
                    }
                    if fctr.seq == fctr::prev_seq(self.rx_seq) {
                        // Stale retransmission of an already-delivered frame;
                        // our acknowledgement must have been lost.
                        self.emit_control(ControlKind::Ack, fctr.seq).await?;
                        continue;
                    }
                    let expected = self.tx_seq;
                    self.emit_control(ControlKind::Sync, self.rx_ack).await?;
                    self.reset_counters();
                    return Err(LinkError::Desync { got: fctr.ack, expected });
                },
            }
        }
    }

    /// Books one receive failure; retransmits while the budget lasts,
    /// otherwise propagates `err`.
    async fn note_failure(
        &mut self,
        failures: &mut u32,
        err: LinkError,
    ) -> Result<(), LinkError> {
        if !err.is_recoverable() {
            return Err(err);
        }
        *failures += 1;
        if *failures >= self.cfg.max_retransmits {
            return Err(err);
        }
        self.phy_write_last_tx().await
    }

    async fn phy_write_last_tx(&mut self) -> Result<(), LinkError> {
        let out = std::mem::take(&mut self.last_tx);
        let res = self.phy.write_data(&out[..]).await;
        self.last_tx = out;
        res
    }

    /// Returns the stashed frame if one exists, otherwise reads from the
    /// wire.
    async fn next_frame(&mut self) -> Result<(Fctr, Range<usize>), LinkError> {
        if let Some(stash) = self.pending.take() {
            self.scratch = stash;
            let view = frame::parse(&self.scratch)?;
            let len = view.payload.len();
            let fctr = view.fctr;
            return Ok((fctr, FRAME_HEADER_LEN..FRAME_HEADER_LEN + len));
        }
        self.read_frame().await
    }

    /// Reads one frame into the scratch buffer and validates it.
    async fn read_frame(&mut self) -> Result<(Fctr, Range<usize>), LinkError> {
        let mut buf = std::mem::take(&mut self.scratch);
        let res = self.phy.read_data(&mut buf, self.cfg.recv_timeout).await;
        self.scratch = buf;
        res?;

        let view = frame::parse(&self.scratch)?;
        let len = view.payload.len();
        let fctr = view.fctr;
        Ok((fctr, FRAME_HEADER_LEN..FRAME_HEADER_LEN + len))
    }

    /// Writes a CONTROL frame; control traffic is never retained for
    /// retransmission.
    async fn emit_control(&mut self, kind: ControlKind, ack: u8) -> Result<(), LinkError> {
        let window = usize::from(self.phy.data_reg_len());
        let mut out = BytesMut::with_capacity(FRAME_OVERHEAD + 1);
        frame::encode(Fctr::control(ack), kind.payload(), window, &mut out)?;
        self.phy.write_data(&out[..]).await
    }

    fn reset_counters(&mut self) {
        self.tx_seq = 0;
        self.rx_seq = 0;
        self.rx_ack = 0;
        self.pending = None;
    }
}
