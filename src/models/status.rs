// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Element-reported command errors.
//!
//! When a response carries a non-zero status byte the dispatcher reads the
//! actual error code from the last-error data object (`0xF1C2`). These are
//! *command-level* failures: the element stays healthy and the next exchange
//! proceeds normally.

use thiserror::Error;

/// Error codes published by the element through the `0xF1C2` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("invalid OID")]
    InvalidOid,
    #[error("invalid parameter field")]
    InvalidParameterField,
    #[error("invalid length field")]
    InvalidLengthField,
    #[error("invalid parameter in data field")]
    InvalidParameterInDataField,
    #[error("internal process error")]
    InternalProcessError,
    #[error("access conditions not satisfied")]
    AccessConditionsNotSatisfied,
    #[error("data object boundary exceeded")]
    DataObjectBoundaryExceeded,
    #[error("metadata truncation error")]
    MetadataTruncationError,
    #[error("invalid command field")]
    InvalidCommandField,
    #[error("command out of sequence")]
    CommandOutOfSequence,
    #[error("command not available")]
    CommandNotAvailable,
    #[error("insufficient memory")]
    InsufficientMemory,
    #[error("counter threshold limit exceeded")]
    CounterThresholdLimitExceeded,
    #[error("invalid manifest")]
    InvalidManifest,
    #[error("acting on invalid metadata")]
    ActingOnInvalidMetadata,
    #[error("unsupported extension or identifier")]
    UnsupportedExtensionOrId,
    #[error("unsupported parameters")]
    UnsupportedParams,
    #[error("unsupported certificate")]
    UnsupportedCertificate,
    #[error("signature verification failure")]
    SignatureVerificationFailure,
    #[error("integrity validation failure")]
    IntegrityValidationFailure,
    #[error("decryption failure")]
    DecryptionFailure,
    #[error("authorization failure")]
    AuthorizationFailure,
    #[error("unknown element error {0:#04x}")]
    Unknown(u8),
}

impl DeviceError {
    /// Maps a non-zero error byte to its meaning. Zero is not an error and
    /// never reaches this table.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::InvalidOid,
            0x03 => Self::InvalidParameterField,
            0x04 => Self::InvalidLengthField,
            0x05 => Self::InvalidParameterInDataField,
            0x06 => Self::InternalProcessError,
            0x07 => Self::AccessConditionsNotSatisfied,
            0x08 => Self::DataObjectBoundaryExceeded,
            0x09 => Self::MetadataTruncationError,
            0x0A => Self::InvalidCommandField,
            0x0B => Self::CommandOutOfSequence,
            0x0C => Self::CommandNotAvailable,
            0x0D => Self::InsufficientMemory,
            0x0E => Self::CounterThresholdLimitExceeded,
            0x0F => Self::InvalidManifest,
            0x11 => Self::ActingOnInvalidMetadata,
            0x24 => Self::UnsupportedExtensionOrId,
            0x25 => Self::UnsupportedParams,
            0x2A => Self::UnsupportedCertificate,
            0x2C => Self::SignatureVerificationFailure,
            0x2D => Self::IntegrityValidationFailure,
            0x2E => Self::DecryptionFailure,
            0x2F => Self::AuthorizationFailure,
            other => Self::Unknown(other),
        }
    }

    /// The on-wire error byte.
    pub fn code(self) -> u8 {
        match self {
            Self::InvalidOid => 0x01,
            Self::InvalidParameterField => 0x03,
            Self::InvalidLengthField => 0x04,
            Self::InvalidParameterInDataField => 0x05,
            Self::InternalProcessError => 0x06,
            Self::AccessConditionsNotSatisfied => 0x07,
            Self::DataObjectBoundaryExceeded => 0x08,
            Self::MetadataTruncationError => 0x09,
            Self::InvalidCommandField => 0x0A,
            Self::CommandOutOfSequence => 0x0B,
            Self::CommandNotAvailable => 0x0C,
            Self::InsufficientMemory => 0x0D,
            Self::CounterThresholdLimitExceeded => 0x0E,
            Self::InvalidManifest => 0x0F,
            Self::ActingOnInvalidMetadata => 0x11,
            Self::UnsupportedExtensionOrId => 0x24,
            Self::UnsupportedParams => 0x25,
            Self::UnsupportedCertificate => 0x2A,
            Self::SignatureVerificationFailure => 0x2C,
            Self::IntegrityValidationFailure => 0x2D,
            Self::DecryptionFailure => 0x2E,
            Self::AuthorizationFailure => 0x2F,
            Self::Unknown(code) => code,
        }
    }
}
