// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    bus::TwoWireBus,
    cfg::config::DispatchConfig,
    client::common::{Descriptor, ExchangeError},
    link::transport::Transport,
    models::{
        apdu::{ApduError, GET_ERROR_CODE, OPEN_APPLICATION, OPEN_APPLICATION_OK, RspHeader},
        status::DeviceError,
    },
    utils::hex_preview,
};

/// State the worker publishes to `Device` handles.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// Consecutive transport faults (including failed resets) since the last
    /// clean round-trip.
    pub reset_count: AtomicU32,
    /// Set once the reset budget is exhausted; never cleared.
    pub dead: AtomicBool,
}

/// The single serialising owner of the transport stack.
///
/// Exactly one APDU is in flight at any time: the worker dequeues one
/// descriptor, runs the full round-trip (including any GetErrorCode
/// sub-exchange), publishes the outcome, and only then looks at the queue
/// again.
pub(crate) struct Worker<B: TwoWireBus> {
    link: Transport<B>,
    cfg: DispatchConfig,
    shared: Arc<Shared>,
    queue: mpsc::Receiver<Descriptor>,
    cancel: CancellationToken,
    scratch: BytesMut,
}

impl<B: TwoWireBus> Worker<B> {
    pub(crate) fn new(
        link: Transport<B>,
        cfg: DispatchConfig,
        shared: Arc<Shared>,
        queue: mpsc::Receiver<Descriptor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            link,
            cfg,
            shared,
            queue,
            cancel,
            scratch: BytesMut::with_capacity(64),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let descriptor = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = self.queue.recv() => match next {
                    Some(d) => d,
                    None => break,
                },
            };

            if self.shared.dead.load(Ordering::Relaxed) {
                descriptor.complete(Err(ExchangeError::Dead));
                continue;
            }

            self.handle(descriptor).await;
        }

        self.queue.close();
        while let Ok(d) = self.queue.try_recv() {
            d.complete(Err(ExchangeError::Closed));
        }
        info!("dispatcher worker stopped");
    }

    /// Brings the element to a known-good state: stack reinitialisation plus
    /// a verified OpenApplication exchange.
    pub(crate) async fn reset(&mut self) -> Result<(), ExchangeError> {
        self.link.init().await?;

        self.link.send_apdu(&OPEN_APPLICATION).await?;
        self.scratch.clear();
        let taken = {
            let mut buf = std::mem::take(&mut self.scratch);
            let res = self
                .link
                .recv_apdu(&mut buf, OPEN_APPLICATION_OK.len())
                .await;
            self.scratch = buf;
            res
        };
        taken?;

        if self.scratch[..] != OPEN_APPLICATION_OK {
            return Err(ExchangeError::Response(ApduError::Malformed(
                "unexpected OpenApplication response",
            )));
        }
        debug!("application context opened");
        Ok(())
    }

    async fn handle(&mut self, descriptor: Descriptor) {
        let Descriptor { tx, mut rx, rx_capacity, done } = descriptor;
        debug!(
            tx = %hex_preview(&tx, 16),
            cap = rx_capacity,
            "starting exchange"
        );

        match self.round_trip(&tx, &mut rx, rx_capacity).await {
            Ok(outcome) => {
                // Transport-wise the element is healthy, whatever the
                // command-level verdict was.
                self.shared.reset_count.store(0, Ordering::Relaxed);
                let result = match outcome {
                    Ok(()) => Ok(rx.freeze()),
                    Err(code) => {
                        debug!(code = code.code(), "element rejected the command");
                        Err(ExchangeError::Element(code))
                    },
                };
                let _ = done.send(result);
            },
            Err(err) => {
                warn!(error = %err, "transport fault; resetting the element");
                let _ = done.send(Err(err));
                self.recover().await;
            },
        }
    }

    /// One full APDU round-trip. `Ok(Ok(()))` means success with the
    /// response in `rx`; `Ok(Err(code))` is an element-level rejection
    /// already resolved through GetErrorCode; `Err` is a transport fault.
    async fn round_trip(
        &mut self,
        tx: &[u8],
        rx: &mut BytesMut,
        rx_capacity: usize,
    ) -> Result<Result<(), DeviceError>, ExchangeError> {
        self.link.send_apdu(tx).await?;
        let len = self.link.recv_apdu(rx, rx_capacity).await?;

        let (header, _body) = RspHeader::parse(&rx[..len])?;
        if header.sta == 0 {
            return Ok(Ok(()));
        }

        let code = self.fetch_error_code().await?;
        Ok(Err(DeviceError::from_code(code)))
    }

    /// Reads the one-byte error object `0xF1C2` without flushing it.
    async fn fetch_error_code(&mut self) -> Result<u8, ExchangeError> {
        self.link.send_apdu(&GET_ERROR_CODE).await?;
        let received = {
            let mut buf = std::mem::take(&mut self.scratch);
            let res = self.link.recv_apdu(&mut buf, 8).await;
            self.scratch = buf;
            res
        };
        received?;

        let (header, body) = RspHeader::parse(&self.scratch[..])?;
        if header.sta != 0 || body.len() != 1 {
            return Err(ExchangeError::Response(ApduError::Malformed(
                "error-code object returned malformed data",
            )));
        }
        Ok(body[0])
    }

    /// Post-fault recovery: count the fault, flush the queue, and reset the
    /// stack until it succeeds or the budget runs out.
    async fn recover(&mut self) {
        self.shared.reset_count.fetch_add(1, Ordering::Relaxed);

        // Abort exactly the descriptors queued at the moment of the fault:
        // their session state on the element will not survive the reset.
        let mut drained = 0u32;
        while let Ok(d) = self.queue.try_recv() {
            d.complete(Err(ExchangeError::Aborted));
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "aborted queued exchanges after transport fault");
        }

        loop {
            if self.shared.reset_count.load(Ordering::Relaxed) > self.cfg.max_resets {
                self.shared.dead.store(true, Ordering::Relaxed);
                error!(
                    budget = self.cfg.max_resets,
                    "reset budget exhausted; driver is dead"
                );
                return;
            }
            match self.reset().await {
                Ok(()) => {
                    info!("element recovered after reset");
                    return;
                },
                Err(err) => {
                    warn!(error = %err, "element reset failed");
                    self.shared.reset_count.fetch_add(1, Ordering::Relaxed);
                },
            }
        }
    }
}
