// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use optiga_trust_rs::cfg::config::{DriverConfig, MIN_RECV_TIMEOUT};

#[test]
fn test_defaults_are_a_working_config() -> Result<()> {
    let mut cfg = DriverConfig::default();
    cfg.validate_and_normalize()?;

    assert_eq!(cfg.bus.address, 0x30);
    assert_eq!(cfg.phy.reg_retries, 5);
    assert_eq!(cfg.phy.retry_delay, Duration::from_millis(10));
    assert_eq!(cfg.link.max_retransmits, 3);
    assert_eq!(cfg.transport.max_apdu_len, 0xFFFF);
    assert_eq!(cfg.dispatch.max_resets, 3);
    Ok(())
}

#[test]
fn test_load_from_yaml() -> Result<()> {
    let cfg = DriverConfig::load_from_file("tests/config.yaml")?;

    assert_eq!(cfg.bus.address, 0x30);
    assert_eq!(cfg.link.recv_timeout, Duration::from_millis(25));
    assert_eq!(cfg.dispatch.queue_depth, 8);
    Ok(())
}

#[test]
fn test_partial_yaml_fills_defaults() -> Result<()> {
    let mut cfg: DriverConfig = serde_yaml::from_str("link:\n  RecvTimeout: 40\n")?;
    cfg.validate_and_normalize()?;

    assert_eq!(cfg.link.recv_timeout, Duration::from_millis(40));
    assert_eq!(cfg.bus.address, 0x30);
    assert_eq!(cfg.dispatch.queue_depth, 16);
    Ok(())
}

#[test]
fn test_recv_timeout_is_clamped_up() -> Result<()> {
    let mut cfg = DriverConfig::default();
    cfg.link.recv_timeout = Duration::from_millis(5);
    cfg.validate_and_normalize()?;
    assert_eq!(cfg.link.recv_timeout, MIN_RECV_TIMEOUT);
    Ok(())
}

#[test]
fn test_bad_address_is_rejected() {
    let mut cfg = DriverConfig::default();
    cfg.bus.address = 0x80;
    assert!(cfg.validate_and_normalize().is_err());

    cfg.bus.address = 0;
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn test_oversized_apdu_limit_is_rejected() {
    let mut cfg = DriverConfig::default();
    cfg.transport.max_apdu_len = 0x1_0000;
    assert!(cfg.validate_and_normalize().is_err());
}
