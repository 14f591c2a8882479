// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-process secure element: a full register + frame + APDU model
//! behind [`TwoWireBus`], with fault injection.
//!
//! The simulator is deliberately strict about the protocol (it checks CRCs,
//! sequence numbers and chain bits) so driver regressions surface as wire
//! errors here rather than only against hardware.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use hex_literal::hex;
use optiga_trust_rs::{
    bus::{BusError, BusResult, TwoWireBus},
    models::{
        fctr::{self, Fctr, FrameType},
        frame::{self, ControlKind, FRAME_OVERHEAD},
        packet::Chain,
    },
};

pub const SIM_ADDRESS: u8 = 0x30;

/// The 27-byte coprocessor UID served from object `0xE0C2`.
pub const CHIP_UID: [u8; 27] =
    hex!("cd163382 01001c00 05000009 091b5c00 07006200 ad801010 710809");

/// Two DER integers, the shape a CalcSign response body has.
pub const FAKE_SIGNATURE: [u8; 68] = hex!(
    "0220 6a43f7661f4a56bbdbdea6a759310fb3b5c1a73dbe6dcd172c42804b2a06c770 0220 17a0e8dd2ac09d3e18212e6c5b1b1fc670aa4f1c374c0e0496b10e1f1e69b1aa"
);

#[derive(Debug, Default)]
struct WireStats {
    /// PCTR bytes of every data packet accepted from the host, in order.
    chains: Vec<u8>,
    /// APDUs executed by the application layer.
    executed: u32,
}

#[derive(Debug)]
struct SimState {
    data_reg_len: u16,
    /// Register selected by the last bare write, served on the next read.
    selected: Option<u8>,

    /// Next host frame number expected.
    rx_seq: u8,
    /// Frame number the next element frame will carry.
    tx_seq: u8,
    /// Frames ready for the host to read, oldest first.
    outbound: VecDeque<Vec<u8>>,
    /// Clean copies of the last response's DATA frames, for retransmission.
    last_response: Vec<Vec<u8>>,
    reassembly: Vec<u8>,
    chain_open: bool,

    app_open: bool,
    last_error: u8,

    // Fault injection.
    nack_all: bool,
    corrupt_fcs: u32,
    force_status: Option<u8>,

    stats: WireStats,
}

impl SimState {
    fn new(data_reg_len: u16) -> Self {
        Self {
            data_reg_len,
            selected: None,
            rx_seq: 0,
            tx_seq: 0,
            outbound: VecDeque::new(),
            last_response: Vec::new(),
            reassembly: Vec::new(),
            chain_open: false,
            app_open: false,
            last_error: 0,
            nack_all: false,
            corrupt_fcs: 0,
            force_status: None,
            stats: WireStats::default(),
        }
    }

    fn reset_link(&mut self) {
        self.rx_seq = 0;
        self.tx_seq = 0;
        self.outbound.clear();
        self.last_response.clear();
        self.reassembly.clear();
        self.chain_open = false;
    }

    fn bus_write(&mut self, addr: u8, bytes: &[u8]) -> BusResult<()> {
        if self.nack_all || addr != SIM_ADDRESS {
            return Err(BusError::Nack);
        }
        let Some((&reg, payload)) = bytes.split_first() else {
            return Err(BusError::Other("empty write".into()));
        };

        match reg {
            0x88 => {
                self.reset_link();
                self.selected = None;
                self.app_open = false;
                self.last_error = 0;
                Ok(())
            },
            _ if payload.is_empty() => {
                self.selected = Some(reg);
                Ok(())
            },
            0x80 => {
                self.ingest_frame(payload);
                Ok(())
            },
            _ => Err(BusError::Other(format!(
                "write to unsupported register {reg:#04x}"
            ))),
        }
    }

    fn bus_read(&mut self, addr: u8, buf: &mut [u8]) -> BusResult<()> {
        if self.nack_all || addr != SIM_ADDRESS {
            return Err(BusError::Nack);
        }
        match self.selected {
            Some(0x82) => {
                let mut word = 1u32 << 27; // soft reset supported
                if let Some(front) = self.outbound.front() {
                    word |= 1 << 30;
                    word |= front.len() as u32;
                }
                fill(buf, &word.to_be_bytes());
                Ok(())
            },
            Some(0x81) => {
                fill(buf, &self.data_reg_len.to_be_bytes());
                Ok(())
            },
            Some(0x80) => {
                let Some(frame) = self.outbound.pop_front() else {
                    return Err(BusError::Other("data read with nothing queued".into()));
                };
                fill(buf, &frame);
                Ok(())
            },
            _ => Err(BusError::Other("read from unselected register".into())),
        }
    }

    fn ingest_frame(&mut self, bytes: &[u8]) {
        let view = match frame::parse(bytes) {
            Ok(view) => view,
            Err(_) => {
                // Broken frame from the host: ask for a retransmission.
                let ack = fctr::prev_seq(self.rx_seq);
                self.queue_control(ControlKind::Nack, ack);
                return;
            },
        };

        match view.fctr.frame_type {
            FrameType::Control => match ControlKind::classify(view.payload) {
                Ok(ControlKind::Sync) => {
                    self.rx_seq = 0;
                    self.tx_seq = 0;
                    self.outbound.clear();
                    self.last_response.clear();
                    self.reassembly.clear();
                    self.chain_open = false;
                },
                Ok(ControlKind::Nack) => self.requeue_response(),
                // Host acknowledgement of our frame; nothing left to do.
                Ok(ControlKind::Ack) | Err(_) => {},
            },
            FrameType::Data => {
                let seq = view.fctr.seq;
                if seq == self.rx_seq {
                    self.rx_seq = fctr::next_seq(self.rx_seq);
                    self.queue_control(ControlKind::Ack, seq);
                    let packet = view.payload.to_vec();
                    self.accept_packet(seq, &packet);
                } else if seq == fctr::prev_seq(self.rx_seq) {
                    // Retransmission of a frame we already accepted.
                    self.outbound.clear();
                    self.queue_control(ControlKind::Ack, seq);
                    self.requeue_response();
                } else {
                    self.queue_control(ControlKind::Sync, seq);
                }
            },
        }
    }

    fn accept_packet(&mut self, host_seq: u8, packet: &[u8]) {
        let Some((&pctr, fragment)) = packet.split_first() else {
            return;
        };
        self.stats.chains.push(pctr);
        let Ok(chain) = Chain::decode(pctr) else {
            return;
        };

        match chain {
            Chain::Only => {
                let apdu = fragment.to_vec();
                self.execute(&apdu, host_seq);
            },
            Chain::First => {
                self.reassembly = fragment.to_vec();
                self.chain_open = true;
            },
            Chain::Middle if self.chain_open => {
                self.reassembly.extend_from_slice(fragment);
            },
            Chain::Last if self.chain_open => {
                self.reassembly.extend_from_slice(fragment);
                self.chain_open = false;
                let apdu = std::mem::take(&mut self.reassembly);
                self.execute(&apdu, host_seq);
            },
            _ => {
                self.chain_open = false;
                self.reassembly.clear();
            },
        }
    }

    fn execute(&mut self, apdu: &[u8], ack_seq: u8) {
        self.stats.executed += 1;
        if apdu.len() < 4 {
            return;
        }
        let cmd = apdu[0];
        let body = &apdu[4..];

        if cmd & 0x80 != 0 {
            self.last_error = 0;
        }

        let (sta, rsp_body): (u8, Vec<u8>) = if let Some(code) = self.force_status.take()
        {
            self.last_error = code;
            (code, Vec::new())
        } else {
            match cmd & 0x7F {
                0x70 => {
                    self.app_open = true;
                    (0, Vec::new())
                },
                0x01 => {
                    let oid = u16::from_be_bytes([body[0], body[1]]);
                    match oid {
                        0xE0C2 => (0, CHIP_UID.to_vec()),
                        0xF1C2 => (0, vec![self.last_error]),
                        _ => {
                            self.last_error = 0x01; // invalid OID
                            (0x01, Vec::new())
                        },
                    }
                },
                0x31 => (0, FAKE_SIGNATURE.to_vec()),
                0x0C => {
                    let n = usize::from(u16::from_be_bytes([body[0], body[1]]));
                    (0, (0..n).map(|i| (i as u8).wrapping_mul(37).wrapping_add(11)).collect())
                },
                _ => {
                    self.last_error = 0x0A; // invalid command field
                    (0x0A, Vec::new())
                },
            }
        };

        let mut rsp = Vec::with_capacity(4 + rsp_body.len());
        rsp.push(sta);
        rsp.push(0);
        rsp.extend_from_slice(&(rsp_body.len() as u16).to_be_bytes());
        rsp.extend_from_slice(&rsp_body);

        self.queue_response(&rsp, ack_seq);
    }

    /// Fragments a response APDU into DATA frames and queues them.
    fn queue_response(&mut self, apdu: &[u8], ack_seq: u8) {
        let mtu = usize::from(self.data_reg_len) - FRAME_OVERHEAD - 1;
        let count = apdu.len().div_ceil(mtu).max(1);

        self.last_response.clear();
        for (index, fragment) in apdu.chunks(mtu).enumerate() {
            let mut packet = Vec::with_capacity(fragment.len() + 1);
            packet.push(Chain::position(index, count).encode());
            packet.extend_from_slice(fragment);

            let encoded = encode_frame(Fctr::data(self.tx_seq, ack_seq), &packet);
            self.tx_seq = fctr::next_seq(self.tx_seq);
            self.last_response.push(encoded.clone());
            self.queue_data_frame(encoded);
        }
    }

    fn requeue_response(&mut self) {
        let frames = self.last_response.clone();
        for encoded in frames {
            self.queue_data_frame(encoded);
        }
    }

    /// DATA frames pass through the corruption tap on their way out.
    fn queue_data_frame(&mut self, mut encoded: Vec<u8>) {
        if self.corrupt_fcs > 0 {
            self.corrupt_fcs -= 1;
            if let Some(last) = encoded.last_mut() {
                *last ^= 0xFF;
            }
        }
        self.outbound.push_back(encoded);
    }

    fn queue_control(&mut self, kind: ControlKind, ack: u8) {
        self.outbound
            .push_back(encode_frame(Fctr::control(ack), kind.payload()));
    }
}

fn encode_frame(fctr: Fctr, payload: &[u8]) -> Vec<u8> {
    let mut out = bytes::BytesMut::new();
    frame::encode(fctr, payload, usize::MAX, &mut out).expect("sim frame encodes");
    out.to_vec()
}

fn fill(buf: &mut [u8], src: &[u8]) {
    for (dst, byte) in buf.iter_mut().zip(src) {
        *dst = *byte;
    }
}

/// The bus half handed to `Device::init`.
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
}

/// The test's half: fault injection and wire statistics.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

/// A simulated element with the default `0x40` register window.
pub fn sim() -> (SimBus, SimHandle) {
    sim_with_window(0x40)
}

pub fn sim_with_window(data_reg_len: u16) -> (SimBus, SimHandle) {
    let state = Arc::new(Mutex::new(SimState::new(data_reg_len)));
    (SimBus { state: Arc::clone(&state) }, SimHandle { state })
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().expect("sim state poisoned")
    }

    /// Every bus transaction NACKs until switched back off.
    pub fn nack_everything(&self, on: bool) {
        self.lock().nack_all = on;
    }

    /// Corrupts the FCS of the next `n` outgoing DATA frames.
    pub fn corrupt_next_fcs(&self, n: u32) {
        self.lock().corrupt_fcs = n;
    }

    /// The next executed command answers with this status byte, and the
    /// code lands in the error object.
    pub fn force_status(&self, code: u8) {
        self.lock().force_status = Some(code);
    }

    pub fn app_open(&self) -> bool {
        self.lock().app_open
    }

    /// PCTR bytes of the data packets accepted so far.
    pub fn chains(&self) -> Vec<u8> {
        self.lock().stats.chains.clone()
    }

    pub fn clear_chains(&self) {
        self.lock().stats.chains.clear();
    }

    pub fn executed(&self) -> u32 {
        self.lock().stats.executed
    }
}

impl TwoWireBus for SimBus {
    fn write(
        &mut self,
        addr: u8,
        bytes: &[u8],
    ) -> impl Future<Output = BusResult<()>> + Send {
        let res = self.state.lock().expect("sim state poisoned").bus_write(addr, bytes);
        std::future::ready(res)
    }

    fn read(
        &mut self,
        addr: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = BusResult<()>> + Send {
        let res = self.state.lock().expect("sim state poisoned").bus_read(addr, buf);
        std::future::ready(res)
    }
}
