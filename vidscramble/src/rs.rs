// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reed-Solomon codec: code length 15, data length 12, FEC length 3,
//! correcting up to one symbol error per block.
//!
//! The reference implementation nominally configures its underlying RS
//! library for a 4-bit field but then feeds it whole, unrestricted data
//! bytes (0-255) as symbols — which only produces correct syndromes if the
//! field is actually wide enough to hold every observed symbol value. This
//! port uses the standard byte-oriented GF(2^8) field (primitive polynomial
//! x^8 + x^4 + x^3 + x^2 + 1, the same field QR codes and CDs use) shortened
//! to a (15, 12) code, which is sound for arbitrary byte payloads and keeps
//! the same block shape (12 data bytes, 3 FEC bytes, 1-error correction).

use std::sync::OnceLock;

use crate::error::{Error, Result};

pub const CODE_LENGTH: usize = 15;
pub const DATA_LENGTH: usize = 12;
pub const FEC_LENGTH: usize = 3;
const GENERATOR_ROOT_INDEX: u32 = 0;
const GENERATOR_ROOT_COUNT: u32 = 3;
/// x^8 + x^4 + x^3 + x^2 + 1
const PRIMITIVE_POLY: u32 = 0x11d;
const FIELD_SIZE: usize = 256;

struct GaloisField {
    exp: Vec<u8>,
    log: Vec<u8>,
}

impl GaloisField {
    fn new() -> GaloisField {
        let mut exp = vec![0u8; 2 * FIELD_SIZE];
        let mut log = vec![0u8; FIELD_SIZE];
        let mut x: u32 = 1;
        for i in 0..(FIELD_SIZE - 1) {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & FIELD_SIZE as u32 != 0 {
                x ^= PRIMITIVE_POLY;
            }
        }
        for i in (FIELD_SIZE - 1)..(2 * FIELD_SIZE) {
            exp[i] = exp[i - (FIELD_SIZE - 1)];
        }
        GaloisField { exp, log }
    }

    fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let la = self.log[a as usize] as usize;
        let lb = self.log[b as usize] as usize;
        self.exp[la + lb]
    }

    fn pow(&self, a: u8, power: u32) -> u8 {
        if a == 0 {
            return 0;
        }
        let l = (self.log[a as usize] as u32 * power) % (FIELD_SIZE as u32 - 1);
        self.exp[l as usize]
    }

    fn inv(&self, a: u8) -> u8 {
        debug_assert!(a != 0);
        let l = self.log[a as usize] as usize;
        self.exp[(FIELD_SIZE - 1 - l) % (FIELD_SIZE - 1)]
    }

    fn div(&self, a: u8, b: u8) -> u8 {
        if a == 0 {
            return 0;
        }
        self.mul(a, self.inv(b))
    }
}

struct ReedSolomon {
    gf: GaloisField,
    /// Generator polynomial coefficients, highest degree first, degree == FEC_LENGTH.
    generator: Vec<u8>,
}

impl ReedSolomon {
    fn new() -> ReedSolomon {
        let gf = GaloisField::new();
        let mut generator = vec![1u8];
        for k in 0..GENERATOR_ROOT_COUNT {
            let root = gf.pow(gf.exp[1], GENERATOR_ROOT_INDEX + k);
            let mut next = vec![0u8; generator.len() + 1];
            for (i, &coeff) in generator.iter().enumerate() {
                next[i] ^= gf.mul(coeff, root);
                next[i + 1] ^= coeff;
            }
            generator = next;
        }
        ReedSolomon { gf, generator }
    }

    fn encode_block(&self, data: &[u8; DATA_LENGTH]) -> [u8; CODE_LENGTH] {
        let mut remainder = vec![0u8; FEC_LENGTH];
        for &coeff_in in data.iter() {
            let feedback = coeff_in ^ remainder[0];
            remainder.remove(0);
            remainder.push(0);
            if feedback != 0 {
                for (i, &g) in self.generator.iter().skip(1).enumerate() {
                    remainder[i] ^= self.gf.mul(g, feedback);
                }
            }
        }
        let mut out = [0u8; CODE_LENGTH];
        out[..DATA_LENGTH].copy_from_slice(data);
        out[DATA_LENGTH..].copy_from_slice(&remainder);
        out
    }

    fn syndromes(&self, block: &[u8; CODE_LENGTH]) -> Vec<u8> {
        (0..GENERATOR_ROOT_COUNT)
            .map(|k| {
                let root = self.gf.pow(self.gf.exp[1], GENERATOR_ROOT_INDEX + k);
                let mut acc = 0u8;
                for &c in block.iter() {
                    acc = self.gf.mul(acc, root) ^ c;
                }
                acc
            })
            .collect()
    }

    fn decode_block(&self, block: &[u8; CODE_LENGTH]) -> Result<[u8; DATA_LENGTH]> {
        let synd = self.syndromes(block);
        if synd.iter().all(|&s| s == 0) {
            let mut out = [0u8; DATA_LENGTH];
            out.copy_from_slice(&block[..DATA_LENGTH]);
            return Ok(out);
        }

        // Three parity symbols locate and correct exactly one error:
        // s0 = e, s1 = e*X, s2 = e*X^2, X = alpha^(position from the high-degree end).
        let s0 = synd[0];
        let s1 = synd[1];
        let s2 = synd[2];
        if s0 == 0 {
            return Err(Error::RsFailure { errors: 2 });
        }
        let x = self.gf.div(s1, s0);
        if x == 0 || self.gf.mul(s1, x) != s2 {
            return Err(Error::RsFailure { errors: 2 });
        }
        let error_pos_from_high = self.gf.log[x as usize] as usize;
        if error_pos_from_high >= CODE_LENGTH {
            return Err(Error::RsFailure { errors: 2 });
        }
        let index = CODE_LENGTH - 1 - error_pos_from_high;
        let mut corrected = *block;
        corrected[index] ^= s0;

        if self.syndromes(&corrected).iter().any(|&s| s != 0) {
            return Err(Error::RsFailure { errors: 2 });
        }

        let mut out = [0u8; DATA_LENGTH];
        out.copy_from_slice(&corrected[..DATA_LENGTH]);
        Ok(out)
    }
}

static RS: OnceLock<ReedSolomon> = OnceLock::new();

fn rs() -> &'static ReedSolomon {
    RS.get_or_init(ReedSolomon::new)
}

/// Encodes up to 12 bytes of data (zero-padded) into a 15-byte RS block.
pub fn encode_block(data: &[u8]) -> [u8; CODE_LENGTH] {
    debug_assert!(data.len() <= DATA_LENGTH);
    let mut padded = [0u8; DATA_LENGTH];
    padded[..data.len()].copy_from_slice(data);
    rs().encode_block(&padded)
}

/// Decodes a 15-byte RS block back into 12 bytes, correcting up to one symbol error.
pub fn decode_block(block: &[u8; CODE_LENGTH]) -> Result<[u8; DATA_LENGTH]> {
    rs().decode_block(block)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_preserves_data_prefix() {
        let data: [u8; DATA_LENGTH] = *b"ABCDEFGHIJKL";
        let block = encode_block(&data);
        assert_eq!(&block[..DATA_LENGTH], &data[..]);
    }

    #[test]
    fn decode_clean_block() {
        let data: [u8; DATA_LENGTH] = *b"ABCDEFGHIJKL";
        let block = encode_block(&data);
        assert_eq!(decode_block(&block).unwrap(), data);
    }

    #[test]
    fn decode_corrects_single_byte_error_in_data() {
        let data: [u8; DATA_LENGTH] = *b"ABCDEFGHIJKL";
        let mut block = encode_block(&data);
        block[7] ^= 0xa5;
        assert_eq!(decode_block(&block).unwrap(), data);
    }

    #[test]
    fn decode_corrects_single_byte_error_in_fec() {
        let data: [u8; DATA_LENGTH] = *b"ABCDEFGHIJKL";
        let mut block = encode_block(&data);
        block[13] ^= 0x42;
        assert_eq!(decode_block(&block).unwrap(), data);
    }

    #[test]
    fn decode_detects_uncorrectable_double_error() {
        let data: [u8; DATA_LENGTH] = *b"ABCDEFGHIJKL";
        let mut block = encode_block(&data);
        block[0] ^= 0xff;
        block[1] ^= 0xff;
        assert!(decode_block(&block).is_err());
    }

    #[test]
    fn round_trip_property() {
        arbtest::arbtest(|u| {
            let mut data = [0u8; DATA_LENGTH];
            for b in data.iter_mut() {
                *b = u.arbitrary::<u8>()?;
            }
            let mut block = encode_block(&data);
            let pos: usize = u.int_in_range(0..=CODE_LENGTH - 1)?;
            let corruption: u8 = u.int_in_range(1u8..=0xffu8)?;
            block[pos] ^= corruption;
            assert_eq!(decode_block(&block).unwrap(), data);
            Ok(())
        });
    }
}
