//! Consistent Overhead Byte Stuffing (§4.2).
//!
//! Encodes a byte string so that the only `0x00` byte in the result is a
//! trailing terminator, at a bounded overhead of one byte per run of up to
//! 254 non-zero bytes.

use crate::error::FramingError;

/// Stuffs `input`, returning the COBS-encoded bytes *without* the trailing
/// `0x00` terminator (callers append it once at the frame level, since some
/// packet kinds ship their id byte raw and skip stuffing entirely).
pub fn stuff(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 254 + 1);
    let mut code_index = out.len();
    out.push(0); // placeholder for the first code byte
    let mut code = 1u8;

    for &byte in input {
        if byte == 0 {
            out[code_index] = code;
            code_index = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(byte);
            code += 1;
            if code == 0xFF {
                out[code_index] = code;
                code_index = out.len();
                out.push(0);
                code = 1;
            }
        }
    }
    out[code_index] = code;
    out
}

/// Unstuffs a COBS-encoded buffer (without its trailing terminator).
///
/// Fails with [`FramingError::CobsInvalidStuffing`] if a code byte would
/// jump past the end of the input, or if the decoded data cannot possibly
/// correspond to a well-formed encoding.
pub fn unstuff(input: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(input.len());
    let n = input.len();
    let mut i = 0;

    while i < n {
        let code = input[i] as usize;
        if code == 0 {
            return Err(FramingError::CobsInvalidStuffing);
        }
        i += 1;
        let data_len = code - 1;
        if i + data_len > n {
            return Err(FramingError::CobsInvalidStuffing);
        }
        out.extend_from_slice(&input[i..i + data_len]);
        i += data_len;

        if code != 0xFF && i != n {
            out.push(0);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &[u8]) {
        let stuffed = stuff(input);
        assert!(!stuffed.contains(&0), "stuffed output must contain no zero byte: {stuffed:x?}");
        let unstuffed = unstuff(&stuffed).expect("well-formed stuffing must decode");
        assert_eq!(unstuffed, input);
    }

    #[test]
    fn empty_input() {
        round_trip(&[]);
    }

    #[test]
    fn no_zero_bytes() {
        round_trip(&[1, 2, 3, 4, 5]);
    }

    #[test]
    fn single_zero() {
        round_trip(&[0]);
    }

    #[test]
    fn leading_and_trailing_zero() {
        round_trip(&[0, 1, 2, 0]);
    }

    #[test]
    fn long_run_crosses_254_boundary() {
        let input: Vec<u8> = (0..300).map(|i| if i % 50 == 0 { 0 } else { 1 }).collect();
        round_trip(&input);
    }

    #[test]
    fn exactly_254_nonzero_bytes() {
        let input = vec![0xAAu8; 254];
        round_trip(&input);
    }

    #[test]
    fn overhead_matches_formula() {
        // A run of L consecutive non-zero bytes needs floor(L/254) + 1 code
        // bytes: one per full 254-byte block, plus the block that closes
        // the run (empty when L is an exact multiple of 254 — the 0xFF code
        // at byte 254 already opened it).
        for len in [0usize, 1, 50, 254, 255, 508, 509, 1000] {
            let input = vec![1u8; len];
            let stuffed = stuff(&input);
            let expected = len + len / 254 + 1;
            assert_eq!(stuffed.len(), expected, "len={len}");
        }
    }

    #[test]
    fn invalid_stuffing_jump_past_end() {
        // Code byte claims 10 bytes follow, but only 2 are present.
        let bogus = [10u8, 1, 2];
        assert!(matches!(
            unstuff(&bogus),
            Err(FramingError::CobsInvalidStuffing)
        ));
    }

    #[test]
    fn invalid_stuffing_zero_code_byte() {
        let bogus = [0u8, 1, 2];
        assert!(matches!(
            unstuff(&bogus),
            Err(FramingError::CobsInvalidStuffing)
        ));
    }
}
