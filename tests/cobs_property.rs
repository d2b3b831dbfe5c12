//! §8 property 1: COBS round-trip, zero-byte-free output, and overhead formula.

use socflash_core::hsuart::cobs::{stuff, unstuff};

#[test]
fn round_trips_for_a_spread_of_inputs() {
    let mut inputs: Vec<Vec<u8>> = vec![vec![], vec![0], vec![0, 0, 0], vec![1, 2, 3]];
    inputs.push((0..=255u16).map(|i| (i % 256) as u8).collect());
    inputs.push(vec![0xAA; 600]);

    for input in inputs {
        let stuffed = stuff(&input);
        assert!(
            !stuffed.contains(&0),
            "stuffed output must contain no zero byte: {input:x?}"
        );
        assert_eq!(unstuff(&stuffed).unwrap(), input);
    }
}

#[test]
fn overhead_formula_holds_across_the_254_boundary() {
    for len in [0usize, 1, 253, 254, 255, 507, 508, 509, 1016] {
        let input = vec![0x42u8; len];
        let stuffed = stuff(&input);
        assert_eq!(stuffed.len(), len + len / 254 + 1, "len={len}");
    }
}
