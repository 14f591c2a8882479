// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use optiga_trust_rs::models::{
    frame::FRAME_OVERHEAD,
    packet::{Chain, PCTR_LEN, PacketError},
};

/// Fragment count and chain sequence for an APDU under a given register
/// window, mirroring what the transport puts on the wire.
fn plan(apdu_len: usize, data_reg_len: usize) -> Vec<Chain> {
    let mtu = data_reg_len - FRAME_OVERHEAD - PCTR_LEN;
    let count = apdu_len.div_ceil(mtu);
    (0..count).map(|i| Chain::position(i, count)).collect()
}

#[test]
fn test_pctr_golden_bytes() {
    assert_eq!(Chain::Only.encode(), 0xC0);
    assert_eq!(Chain::First.encode(), 0x80);
    assert_eq!(Chain::Middle.encode(), 0x00);
    assert_eq!(Chain::Last.encode(), 0x40);
}

#[test]
fn test_reserved_pctr_bits_are_a_violation() {
    for low in 1..=0x3Fu8 {
        assert_eq!(Chain::decode(0xC0 | low), Err(PacketError::ReservedBits(0xC0 | low)));
    }
}

#[test]
fn test_apdu_equal_to_mtu_is_only() {
    // Window 0x40 → MTU 58.
    assert_eq!(plan(58, 0x40), [Chain::Only]);
}

#[test]
fn test_apdu_one_over_mtu_splits_in_two() {
    assert_eq!(plan(59, 0x40), [Chain::First, Chain::Last]);
}

#[test]
fn test_long_apdu_chains_through_middles() {
    // A 204-byte CalcSign APDU under the default window: 58+58+58+30.
    assert_eq!(
        plan(204, 0x40),
        [Chain::First, Chain::Middle, Chain::Middle, Chain::Last]
    );
}

#[test]
fn test_minimum_window_still_fragments() {
    // Window 0x10 → MTU 10; a maximum-length APDU still chains.
    let chains = plan(0xFFFF, 0x10);
    assert_eq!(chains.len(), 6554);
    assert_eq!(chains[0], Chain::First);
    assert!(chains[1..chains.len() - 1].iter().all(|c| *c == Chain::Middle));
    assert_eq!(chains[chains.len() - 1], Chain::Last);
}
