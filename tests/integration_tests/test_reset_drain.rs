// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use optiga_trust_rs::{
    cfg::config::DriverConfig,
    client::{common::ExchangeError, device::Device},
    commands::{data_object, decode_response},
    link::LinkError,
    models::frame::FrameError,
};

use super::common::{CHIP_UID, sim};

#[tokio::test]
async fn test_three_crc_faults_reset_and_drain() -> Result<()> {
    let (bus, handle) = sim();
    let device = Device::init(bus, DriverConfig::default()).await?;

    // Three consecutive corrupted response frames exhaust the
    // retransmission budget of the exchange in flight.
    handle.corrupt_next_fcs(3);

    // On a current-thread runtime the worker cannot run between these
    // sends, so all three sit in the queue when the fault hits.
    let first = device.submit(data_object::read_chip_id()?, 64).await?;
    let second = device.submit(data_object::read_chip_id()?, 64).await?;
    let third = device.submit(data_object::read_chip_id()?, 64).await?;

    let err = first.wait().await.expect_err("in-flight exchange must fail");
    assert!(matches!(
        err,
        ExchangeError::Link(LinkError::Frame(FrameError::Fcs { .. }))
    ));

    // The queued suffix is aborted, in order, without touching the wire.
    assert_eq!(second.wait().await, Err(ExchangeError::Aborted));
    assert_eq!(third.wait().await, Err(ExchangeError::Aborted));

    assert_eq!(device.reset_count(), 1);
    assert!(!device.is_dead());

    // The stack was reset underneath; fresh submissions work and a clean
    // round-trip clears the counter.
    let rsp = device.execute(data_object::read_chip_id()?, 64).await?;
    assert_eq!(decode_response(&rsp)?, CHIP_UID);
    assert_eq!(device.reset_count(), 0);

    device.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_response_overflow_is_a_transport_fault() -> Result<()> {
    let (bus, _handle) = sim();
    let device = Device::init(bus, DriverConfig::default()).await?;

    // The chip-id response needs 31 bytes; give it 8. No partial APDU may
    // be delivered, and the stack resets.
    let pending = device.submit(data_object::read_chip_id()?, 8).await?;
    let err = pending.wait().await.expect_err("overflow must fail");
    assert!(matches!(err, ExchangeError::Link(LinkError::Overflow { .. })));
    assert_eq!(device.reset_count(), 1);

    let rsp = device.execute(data_object::read_chip_id()?, 64).await?;
    assert_eq!(decode_response(&rsp)?, CHIP_UID);

    device.shutdown().await;
    Ok(())
}
