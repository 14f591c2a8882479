// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, atomic::Ordering};

use anyhow::{Context, Result, bail};
use bytes::{Bytes, BytesMut};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    bus::TwoWireBus,
    cfg::config::DriverConfig,
    client::{
        common::{Descriptor, PendingExchange},
        worker::{Shared, Worker},
    },
    link::{data_link::DataLink, phy::Phy, transport::Transport},
    models::apdu::APDU_HEADER_LEN,
};

/// Handle to one secure element.
///
/// Binding is exclusive: the bus handle moves into the worker at `init` and
/// every exchange is serialised through it. The handle itself is cheap to
/// share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct Device {
    queue: mpsc::Sender<Descriptor>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Device {
    /// Binds `bus`, brings the element up (stack reset + OpenApplication),
    /// and spawns the dispatcher worker.
    ///
    /// Calling this on a freshly constructed instance after a previous one
    /// was shut down is equivalent to a reset followed by steady state; the
    /// element holds no host-visible state across OpenApplication.
    pub async fn init<B: TwoWireBus>(bus: B, mut cfg: DriverConfig) -> Result<Self> {
        cfg.validate_and_normalize()?;
        let DriverConfig { bus: bus_cfg, phy, link, transport, dispatch } = cfg;
        let max_resets = dispatch.max_resets;

        let phy = Phy::new(bus, bus_cfg.address, phy);
        let dl = DataLink::new(phy, link);
        let transport = Transport::new(dl, transport);

        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();
        let (queue_tx, queue_rx) = mpsc::channel(dispatch.queue_depth);

        let mut worker = Worker::new(
            transport,
            dispatch,
            Arc::clone(&shared),
            queue_rx,
            cancel.clone(),
        );

        // Bring-up gets the same budget as runtime recovery.
        let mut attempt = 0;
        loop {
            match worker.reset().await {
                Ok(()) => break,
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_resets {
                        return Err(err).context("element bring-up failed");
                    }
                    warn!(error = %err, attempt, "bring-up reset failed; retrying");
                },
            }
        }

        let worker = tokio::spawn(worker.run());

        Ok(Self { queue: queue_tx, shared, cancel, worker: Some(worker) })
    }

    /// Enqueues one exchange. `tx` must be a complete APDU; the response is
    /// written into a fresh buffer of at most `rx_capacity` bytes and handed
    /// back through the returned [`PendingExchange`].
    ///
    /// Exchanges complete strictly in submission order. May briefly block
    /// when the queue is full.
    pub async fn submit(&self, tx: Bytes, rx_capacity: usize) -> Result<PendingExchange> {
        if tx.len() < APDU_HEADER_LEN {
            bail!("APDU of {} bytes is shorter than its header", tx.len());
        }
        if rx_capacity < APDU_HEADER_LEN {
            bail!("response capacity of {rx_capacity} bytes cannot hold a header");
        }

        let (done, rx) = tokio::sync::oneshot::channel();
        let descriptor = Descriptor {
            tx,
            rx: BytesMut::with_capacity(rx_capacity),
            rx_capacity,
            done,
        };

        self.queue
            .send(descriptor)
            .await
            .map_err(|_| anyhow::anyhow!("dispatcher worker is gone"))?;

        Ok(PendingExchange { rx })
    }

    /// Submit and wait in one call.
    pub async fn execute(&self, tx: Bytes, rx_capacity: usize) -> Result<Bytes> {
        let pending = self.submit(tx, rx_capacity).await?;
        Ok(pending.wait().await?)
    }

    /// Consecutive transport faults since the last clean round-trip.
    pub fn reset_count(&self) -> u32 {
        self.shared.reset_count.load(Ordering::Relaxed)
    }

    /// Whether the reset budget is exhausted. A dead device completes every
    /// exchange with [`crate::client::common::ExchangeError::Dead`] without
    /// touching the wire.
    pub fn is_dead(&self) -> bool {
        self.shared.dead.load(Ordering::Relaxed)
    }

    /// Stops the worker and waits for it to drain. Queued exchanges complete
    /// with [`crate::client::common::ExchangeError::Closed`].
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
