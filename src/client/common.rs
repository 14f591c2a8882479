// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::{
    link::LinkError,
    models::{apdu::ApduError, status::DeviceError},
};

/// How one submitted exchange ended.
///
/// The outcome space mirrors the element contract: success carries the
/// response APDU; `Element` is the positive code space reported by the chip;
/// everything else is the host-side failure space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The element executed the transport exchange but rejected the command;
    /// the code was fetched from the last-error object.
    #[error("element reported: {0}")]
    Element(#[from] DeviceError),
    /// The layered transport failed; the stack has been reset.
    #[error("transport failure: {0}")]
    Link(#[from] LinkError),
    /// The response APDU header did not describe the received bytes.
    #[error("malformed response: {0}")]
    Response(#[from] ApduError),
    /// The exchange was queued when a transport fault hit; any session state
    /// it relied on died with the reset, so it must be resubmitted.
    #[error("exchange aborted: the element was reset after a transport fault")]
    Aborted,
    /// Reset failed too many consecutive times; the driver is wedged for
    /// good and every exchange fails fast.
    #[error("device is dead after repeated reset failures")]
    Dead,
    /// The driver was shut down before the exchange completed.
    #[error("driver shut down before the exchange completed")]
    Closed,
}

impl ExchangeError {
    /// The element error byte, when the element itself produced the failure.
    pub fn element_code(&self) -> Option<u8> {
        match self {
            Self::Element(e) => Some(e.code()),
            _ => None,
        }
    }
}

pub type ExchangeResult = Result<Bytes, ExchangeError>;

/// One queued exchange: the command APDU, the response buffer, and the
/// completion side of the caller's oneshot.
#[derive(Debug)]
pub(crate) struct Descriptor {
    pub tx: Bytes,
    pub rx: BytesMut,
    pub rx_capacity: usize,
    pub done: oneshot::Sender<ExchangeResult>,
}

impl Descriptor {
    /// Completes the exchange; a vanished caller is not an error.
    pub fn complete(self, result: ExchangeResult) {
        let _ = self.done.send(result);
    }
}

/// Caller side of a submitted exchange.
#[derive(Debug)]
pub struct PendingExchange {
    pub(crate) rx: oneshot::Receiver<ExchangeResult>,
}

impl PendingExchange {
    /// Suspends until the worker publishes the outcome. Fires exactly once
    /// per submitted exchange.
    pub async fn wait(self) -> ExchangeResult {
        self.rx.await.unwrap_or(Err(ExchangeError::Closed))
    }
}
