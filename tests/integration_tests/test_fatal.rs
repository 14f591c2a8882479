// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use optiga_trust_rs::{
    cfg::config::DriverConfig,
    client::{common::ExchangeError, device::Device},
    commands::data_object,
    link::LinkError,
};
use tokio::time::sleep;

use super::common::sim;

#[tokio::test(start_paused = true)]
async fn test_nack_storm_kills_the_device() -> Result<()> {
    let (bus, handle) = sim();
    let device = Device::init(bus, DriverConfig::default()).await?;

    handle.nack_everything(true);
    let executed_before = handle.executed();

    // The in-flight exchange dies on the wire...
    let pending = device.submit(data_object::read_chip_id()?, 64).await?;
    let err = pending.wait().await.expect_err("exchange must fail");
    assert!(matches!(err, ExchangeError::Link(LinkError::Nack { .. })));

    // ...and every recovery reset NACKs too, until the budget is gone.
    for _ in 0..200 {
        if device.is_dead() {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert!(device.is_dead());
    assert!(device.reset_count() > 3);

    // A dead device fails fast without touching the wire.
    let pending = device.submit(data_object::read_chip_id()?, 64).await?;
    assert_eq!(pending.wait().await, Err(ExchangeError::Dead));
    assert_eq!(handle.executed(), executed_before);

    device.shutdown().await;
    Ok(())
}
