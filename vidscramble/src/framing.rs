// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fixed-header metadata framing: three `u16` values packed in network byte
//! order, prepended to the RS-encoded compressed payload.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

pub const METADATA_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub num_rows: u16,
    pub num_blocks_per_row: u16,
    pub compressed_payload_len: u16,
}

pub fn encode(m: Metadata) -> [u8; METADATA_LEN] {
    let mut out = [0u8; METADATA_LEN];
    BigEndian::write_u16(&mut out[0..2], m.num_rows);
    BigEndian::write_u16(&mut out[2..4], m.num_blocks_per_row);
    BigEndian::write_u16(&mut out[4..6], m.compressed_payload_len);
    out
}

pub fn decode(bytes: &[u8]) -> Result<Metadata> {
    if bytes.len() != METADATA_LEN {
        return Err(Error::FramingError {
            expected: METADATA_LEN,
            actual: bytes.len(),
        });
    }
    Ok(Metadata {
        num_rows: BigEndian::read_u16(&bytes[0..2]),
        num_blocks_per_row: BigEndian::read_u16(&bytes[2..4]),
        compressed_payload_len: BigEndian::read_u16(&bytes[4..6]),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let m = Metadata {
            num_rows: 4,
            num_blocks_per_row: 152,
            compressed_payload_len: 321,
        };
        assert_eq!(decode(&encode(m)).unwrap(), m);
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(decode(&[0u8; 5]).is_err());
        assert!(decode(&[0u8; 7]).is_err());
    }
}
