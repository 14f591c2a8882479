// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use optiga_trust_rs::{
    cfg::config::DriverConfig,
    client::device::Device,
    commands::{data_object, decode_response},
};

use super::common::{CHIP_UID, sim, sim_with_window};

#[tokio::test]
async fn test_chip_id_roundtrip() -> Result<()> {
    let (bus, _handle) = sim();
    let device = Device::init(bus, DriverConfig::default()).await?;

    let rsp = device.execute(data_object::read_chip_id()?, 64).await?;

    assert_eq!(&rsp[..4], [0x00, 0x00, 0x00, 0x1B]);
    assert_eq!(decode_response(&rsp)?, CHIP_UID);

    device.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_chip_id_through_minimum_window() -> Result<()> {
    // DATA_REG_LEN 0x10 → MTU 10: the 31-byte response APDU arrives in four
    // chained frames and reassembles transparently.
    let (bus, _handle) = sim_with_window(0x10);
    let device = Device::init(bus, DriverConfig::default()).await?;

    let rsp = device.execute(data_object::read_chip_id()?, 64).await?;
    assert_eq!(decode_response(&rsp)?, CHIP_UID);

    device.shutdown().await;
    Ok(())
}
