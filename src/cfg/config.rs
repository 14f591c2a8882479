// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Minimum data-link receive deadline the protocol tolerates; shorter values
/// are normalized up.
pub const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(20);

/// Driver tuning grouped by protocol layer. Every knob has a default that
/// matches the element's datasheet values, so `DriverConfig::default()` is a
/// working configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct DriverConfig {
    /// Bus binding (peer address).
    #[serde(default)]
    pub bus: BusConfig,
    /// Register-level retry and polling behaviour.
    #[serde(default)]
    pub phy: PhyConfig,
    /// Frame-level retransmission behaviour.
    #[serde(default)]
    pub link: LinkConfig,
    /// APDU-level limits.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Request queue and fault-recovery behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Bus binding parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BusConfig {
    #[serde(rename = "Address", default = "defaults::address")]
    /// 7-bit peer address on the two-wire bus.
    pub address: u8,
}

/// Register transaction tuning.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PhyConfig {
    #[serde(rename = "RegRetries", default = "defaults::reg_retries")]
    /// Attempts per register phase before a NACK becomes an I/O fault.
    pub reg_retries: u32,

    #[serde(rename = "RetryDelay", default = "defaults::retry_delay", with = "serde_millis")]
    /// Pause between NACKed attempts.
    pub retry_delay: Duration,

    #[serde(rename = "PollInterval", default = "defaults::poll_interval", with = "serde_millis")]
    /// Pause between status-register polls.
    pub poll_interval: Duration,

    #[serde(rename = "PollTimeout", default = "defaults::poll_timeout", with = "serde_millis")]
    /// Deadline for the element to leave its busy state after a reset.
    pub poll_timeout: Duration,
}

/// Data-link tuning.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LinkConfig {
    #[serde(rename = "RecvTimeout", default = "defaults::recv_timeout", with = "serde_millis")]
    /// Deadline for one frame to become readable.
    pub recv_timeout: Duration,

    #[serde(rename = "MaxRetransmits", default = "defaults::max_retransmits")]
    /// Consecutive receive failures tolerated before the round-trip is
    /// escalated as a transport fault.
    pub max_retransmits: u32,
}

/// Transport-level limits.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransportConfig {
    #[serde(rename = "MaxApduLen", default = "defaults::max_apdu_len")]
    /// Largest APDU accepted from command encoders.
    pub max_apdu_len: usize,
}

/// Dispatcher tuning.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DispatchConfig {
    #[serde(rename = "QueueDepth", default = "defaults::queue_depth")]
    /// Bound of the request queue; submitters block when it is full.
    pub queue_depth: usize,

    #[serde(rename = "MaxResets", default = "defaults::max_resets")]
    /// Consecutive failed resets tolerated before the driver goes dead.
    pub max_resets: u32,
}

mod defaults {
    use std::time::Duration;

    pub fn address() -> u8 {
        0x30
    }
    pub fn reg_retries() -> u32 {
        5
    }
    pub fn retry_delay() -> Duration {
        Duration::from_millis(10)
    }
    pub fn poll_interval() -> Duration {
        Duration::from_millis(1)
    }
    pub fn poll_timeout() -> Duration {
        Duration::from_millis(100)
    }
    pub fn recv_timeout() -> Duration {
        Duration::from_millis(50)
    }
    pub fn max_retransmits() -> u32 {
        3
    }
    pub fn max_apdu_len() -> usize {
        crate::models::apdu::MAX_APDU_LEN
    }
    pub fn queue_depth() -> usize {
        16
    }
    pub fn max_resets() -> u32 {
        3
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { address: defaults::address() }
    }
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            reg_retries: defaults::reg_retries(),
            retry_delay: defaults::retry_delay(),
            poll_interval: defaults::poll_interval(),
            poll_timeout: defaults::poll_timeout(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recv_timeout: defaults::recv_timeout(),
            max_retransmits: defaults::max_retransmits(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { max_apdu_len: defaults::max_apdu_len() }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_depth: defaults::queue_depth(),
            max_resets: defaults::max_resets(),
        }
    }
}

impl DriverConfig {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: DriverConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.bus.address != 0 && self.bus.address <= 0x7F,
            "Address must be a non-zero 7-bit value"
        );
        ensure!(self.phy.reg_retries >= 1, "RegRetries must be >= 1");
        ensure!(
            self.phy.poll_interval < self.phy.poll_timeout,
            "PollInterval must be shorter than PollTimeout"
        );
        ensure!(self.link.max_retransmits >= 1, "MaxRetransmits must be >= 1");
        ensure!(
            self.transport.max_apdu_len <= crate::models::apdu::MAX_APDU_LEN,
            "MaxApduLen must not exceed the protocol limit of 0xFFFF"
        );
        ensure!(
            self.transport.max_apdu_len >= crate::models::apdu::APDU_HEADER_LEN,
            "MaxApduLen must fit at least an APDU header"
        );
        ensure!(self.dispatch.queue_depth >= 1, "QueueDepth must be >= 1");

        // The element is allowed up to 20 ms to produce a frame.
        if self.link.recv_timeout < MIN_RECV_TIMEOUT {
            self.link.recv_timeout = MIN_RECV_TIMEOUT;
        }

        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
