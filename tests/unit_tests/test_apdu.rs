// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use optiga_trust_rs::{
    commands::{data_object, decode_response},
    models::apdu::{GET_ERROR_CODE, OPEN_APPLICATION, RspHeader},
};

use super::load_fixture;

#[test]
fn test_open_application_matches_fixture() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/apdu/open_application.hex")?;
    assert_eq!(&OPEN_APPLICATION[..], &expected[..]);
    Ok(())
}

#[test]
fn test_get_error_code_matches_fixture() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/apdu/get_error_code.hex")?;
    assert_eq!(&GET_ERROR_CODE[..], &expected[..]);

    // The encoder must produce byte-identical output to the dispatcher's
    // fixed image.
    let encoded = data_object::read_error_code()?;
    assert_eq!(&encoded[..], &expected[..]);
    Ok(())
}

#[test]
fn test_chip_id_request_matches_fixture() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/apdu/chip_id_request.hex")?;
    let encoded = data_object::read_chip_id()?;
    assert_eq!(&encoded[..], &expected[..]);
    Ok(())
}

#[test]
fn test_chip_id_response_decodes() -> Result<()> {
    let rx = load_fixture("tests/unit_tests/fixtures/apdu/chip_id_response.hex")?;

    let (header, body) = RspHeader::parse(&rx).expect("well-formed response");
    assert_eq!(header.sta, 0);
    assert_eq!(usize::from(header.len.get()), rx.len() - 4);

    let uid = decode_response(&rx)?;
    assert_eq!(uid.len(), 27);
    Ok(())
}

#[test]
fn test_response_with_status_is_rejected_by_decoder() {
    let rx = [0x07, 0x00, 0x00, 0x00];
    assert!(decode_response(&rx).is_err());
}
