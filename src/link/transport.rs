// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Network/transport layer: one APDU in, one APDU out, regardless of how
//! many frames it takes.

use bytes::{BufMut, BytesMut};

use crate::{
    bus::TwoWireBus,
    cfg::config::TransportConfig,
    link::{LinkError, data_link::DataLink, phy::Phy},
    models::{
        frame::FRAME_OVERHEAD,
        packet::{Chain, PCTR_LEN},
    },
};

#[derive(Debug)]
pub struct Transport<B> {
    dl: DataLink<B>,
    cfg: TransportConfig,
    scratch: BytesMut,
}

impl<B: TwoWireBus> Transport<B> {
    pub fn new(dl: DataLink<B>, cfg: TransportConfig) -> Self {
        Self { dl, cfg, scratch: BytesMut::new() }
    }

    #[inline]
    pub fn phy(&self) -> &Phy<B> {
        self.dl.phy()
    }

    /// Largest APDU fragment one frame can carry under the negotiated
    /// register window.
    #[inline]
    pub fn mtu(&self) -> usize {
        usize::from(self.dl.phy().data_reg_len()) - FRAME_OVERHEAD - PCTR_LEN
    }

    /// Brings the whole stack to a known state: PHY soft reset and window
    /// negotiation, then data-link resynchronisation. The transport layer
    /// itself holds no session state.
    pub async fn init(&mut self) -> Result<(), LinkError> {
        self.dl.phy_mut().init().await?;
        self.dl.init().await
    }

    /// Fragments and sends one APDU.
    pub async fn send_apdu(&mut self, apdu: &[u8]) -> Result<(), LinkError> {
        if apdu.len() > self.cfg.max_apdu_len {
            return Err(LinkError::ApduTooLong {
                len: apdu.len(),
                max: self.cfg.max_apdu_len,
            });
        }

        let mtu = self.mtu();
        let count = apdu.len().div_ceil(mtu).max(1);
        for (index, fragment) in apdu.chunks(mtu).enumerate() {
            let mut packet = std::mem::take(&mut self.scratch);
            packet.clear();
            packet.put_u8(Chain::position(index, count).encode());
            packet.extend_from_slice(fragment);
            let sent = self.dl.send(&packet[..]).await;
            self.scratch = packet;
            sent?;
        }
        Ok(())
    }

    /// Receives and reassembles one APDU into `out`, never exceeding `cap`
    /// bytes. On any failure `out` holds no usable partial APDU.
    pub async fn recv_apdu(
        &mut self,
        out: &mut BytesMut,
        cap: usize,
    ) -> Result<usize, LinkError> {
        out.clear();
        let mut first = true;
        loop {
            let packet = self.dl.recv().await?;
            let Some((&pctr, fragment)) = packet.split_first() else {
                return Err(LinkError::Chain("empty packet"));
            };
            let chain = Chain::decode(pctr)?;

            match (first, chain) {
                (true, Chain::Only | Chain::First) => {},
                (false, Chain::Middle | Chain::Last) => {},
                (true, _) => {
                    return Err(LinkError::Chain("chain continued before it started"));
                },
                (false, _) => {
                    return Err(LinkError::Chain("chain restarted mid-assembly"));
                },
            }

            if out.len() + fragment.len() > cap {
                let needed = out.len() + fragment.len();
                out.clear();
                return Err(LinkError::Overflow { needed, cap });
            }
            out.extend_from_slice(fragment);

            if chain.is_final() {
                return Ok(out.len());
            }
            first = false;
        }
    }
}
