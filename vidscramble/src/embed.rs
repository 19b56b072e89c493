// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Composes the RS codec, bit-expander and metadata framing with compression
//! and fiducial markers into a rectangular color-block image, and the
//! matching decode path that reads pixel values back out of a received frame.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::bitexpand;
use crate::error::{Error, Result};
use crate::framing::{self, Metadata, METADATA_LEN};
use crate::frame::Frame;
use crate::markers;
use crate::rs;

/// Each byte is bit-expanded by this factor before being rendered as a pixel
/// channel, to survive lossy color transport.
pub const EXPANSION: u32 = 4;

const WHITE: [u8; 3] = [255, 255, 255];
const TOP_PAD_ROWS: u32 = 16;

#[derive(Clone, Debug)]
pub struct DataEmbed {
    block_size: u32,
    num_rows: u32,
    image_width: u32,
    fiducial_marker_size: u32,
    image_width_with_marker: u32,
    num_blocks_per_row: u32,
    fiducial_marker_col_2: u32,
    num_bytes_per_row: u32,
    num_bytes_total: u32,
}

impl DataEmbed {
    pub fn new(block_size: u32, num_rows: u32, image_width: u32) -> Result<DataEmbed> {
        if block_size < 2 {
            return Err(Error::ConfigError("block size should be at least 2".into()));
        }
        if block_size % 2 != 0 {
            return Err(Error::ConfigError("block size should be even".into()));
        }
        if num_rows < 4 {
            return Err(Error::ConfigError(
                "number of data embed rows should be at least 4".into(),
            ));
        }

        let fiducial_marker_size = 4 * block_size;
        let min_image_width =
            (rs::CODE_LENGTH as u32 / 3) * block_size + 2 * fiducial_marker_size + 2 * block_size;
        if image_width < min_image_width {
            return Err(Error::ConfigError(format!(
                "image width must be at least {min_image_width}"
            )));
        }

        let image_width_with_marker = image_width + 5 * block_size;
        let num_bits_per_block = 24u32;
        let num_blocks_per_row =
            (image_width_with_marker - 2 * fiducial_marker_size - 2 * block_size) / block_size;
        let num_bits_per_row = num_blocks_per_row * num_bits_per_block;
        let fiducial_marker_col_2 =
            fiducial_marker_size + block_size + num_blocks_per_row * block_size + block_size / 2;
        let num_bytes_per_row = num_bits_per_row / 8;
        let num_bytes_total = num_bytes_per_row * num_rows;

        Ok(DataEmbed {
            block_size,
            num_rows,
            image_width,
            fiducial_marker_size,
            image_width_with_marker,
            num_blocks_per_row,
            fiducial_marker_col_2,
            num_bytes_per_row,
            num_bytes_total,
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    pub fn num_blocks_per_row(&self) -> u32 {
        self.num_blocks_per_row
    }

    pub fn data_region_width(&self) -> u32 {
        self.num_blocks_per_row * self.block_size
    }

    pub fn data_region_height(&self) -> u32 {
        self.num_rows * self.block_size
    }

    fn rs_encode_stream(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity((bytes.len() / rs::DATA_LENGTH + 1) * rs::CODE_LENGTH);
        for chunk in bytes.chunks(rs::DATA_LENGTH) {
            out.extend_from_slice(&rs::encode_block(chunk));
        }
        out
    }

    /// Compresses, frames, RS-encodes and bit-expands `payload`, returning the
    /// raw (pre-render) byte buffer zero-padded to this geometry's capacity.
    pub fn encode_data(&self, payload: &str) -> Result<Vec<u8>> {
        let mut compressor = DeflateEncoder::new(Vec::new(), Compression::default());
        compressor.write_all(payload.as_bytes())?;
        let compressed = compressor.finish()?;

        let metadata = framing::encode(Metadata {
            num_rows: self.num_rows as u16,
            num_blocks_per_row: self.num_blocks_per_row as u16,
            compressed_payload_len: compressed.len() as u16,
        });

        let mut framed = Vec::with_capacity(METADATA_LEN + compressed.len());
        framed.extend_from_slice(&metadata);
        framed.extend_from_slice(&compressed);

        let rs_data = Self::rs_encode_stream(&framed);
        let expanded = bitexpand::expand(&rs_data, EXPANSION)?;

        if expanded.len() as u32 > self.num_bytes_total {
            return Err(Error::CapacityError {
                needed: expanded.len(),
                capacity: self.num_bytes_total as usize,
            });
        }

        let mut out = vec![0u8; self.num_bytes_total as usize];
        out[..expanded.len()].copy_from_slice(&expanded);
        Ok(out)
    }

    /// Decodes a raw byte buffer (as produced by [`Self::encode_data`] or read
    /// back from a rendered frame) into the original payload string.
    pub fn decode_data(&self, enc_data: &[u8]) -> Result<String> {
        decode_data(enc_data)
    }

    /// Decodes just the metadata header, RS-decoding blocks sequentially
    /// until enough bytes have been recovered. Used by the fiducial detector,
    /// which only needs the header to validate a candidate block pitch.
    pub fn decode_metadata_from(shrunk: &[u8]) -> Result<Metadata> {
        let mut buf = Vec::with_capacity(METADATA_LEN + rs::DATA_LENGTH);
        let mut ptr = 0usize;
        while buf.len() < METADATA_LEN {
            if ptr + rs::CODE_LENGTH > shrunk.len() {
                return Err(Error::TruncationError {
                    got: buf.len(),
                    expected: METADATA_LEN,
                });
            }
            let mut block = [0u8; rs::CODE_LENGTH];
            block.copy_from_slice(&shrunk[ptr..ptr + rs::CODE_LENGTH]);
            buf.extend_from_slice(&rs::decode_block(&block)?);
            ptr += rs::CODE_LENGTH;
        }
        framing::decode(&buf[..METADATA_LEN])
    }

    fn blank_strip_with_padder(&self, img: &Frame) -> Result<Frame> {
        let data_strip = Frame::filled(
            self.image_width_with_marker,
            self.num_rows * self.block_size,
            WHITE,
        )?;
        let padder_v = Frame::filled(
            self.image_width_with_marker - self.image_width,
            img.height(),
            WHITE,
        )?;
        let img_vpad = img.hconcat(&padder_v)?;

        let padder_h = Frame::filled(self.image_width_with_marker, self.block_size / 2, WHITE)?;
        let padder_top = Frame::filled(self.image_width_with_marker, TOP_PAD_ROWS, WHITE)?;

        let assembled = padder_top.vconcat(&img_vpad)?.vconcat(&padder_h)?;
        assembled.vconcat(&data_strip)?.vconcat(&padder_h)
    }

    /// Renders `payload` onto the right and bottom of `img` (which must be
    /// `image_width` wide), producing the full wire frame with fiducial
    /// markers and the color-block data grid.
    pub fn encoded_data_as_image(&self, img: &Frame, payload: &str) -> Result<Frame> {
        if img.width() != self.image_width {
            return Err(Error::ShapeError(format!(
                "expected {} cols in the image, got {} instead",
                self.image_width,
                img.width()
            )));
        }

        let encoded = self.encode_data(payload)?;

        let mut data_strip = Frame::filled(
            self.image_width_with_marker,
            self.num_rows * self.block_size,
            WHITE,
        )?;

        let marker0 = markers::render(markers::MARKER_IDS[0], self.fiducial_marker_size)?;
        data_strip.paste(&marker0, self.block_size / 2, 0)?;
        let marker1 = markers::render(markers::MARKER_IDS[1], self.fiducial_marker_size)?;
        data_strip.paste(
            &marker1,
            self.fiducial_marker_col_2,
            (self.num_rows - 4) * self.block_size,
        )?;

        for i in 0..self.num_rows {
            let j0 = (i * self.num_bytes_per_row) as usize;
            let j1 = ((i + 1) * self.num_bytes_per_row) as usize;
            let mut k = 0u32;
            let mut j = j0;
            while j + 2 < j1 {
                let x = self.fiducial_marker_size + self.block_size + k * self.block_size;
                data_strip.set(x, i * self.block_size, [encoded[j], encoded[j + 1], encoded[j + 2]]);
                j += 3;
                k += 1;
            }
            // flat-fill each block row: replicate the top pixel across the block.
            for kk in 0..self.num_blocks_per_row {
                let x = self.fiducial_marker_size + self.block_size + kk * self.block_size;
                data_strip.flat_fill_block(x, i * self.block_size, self.block_size, self.block_size)?;
            }
        }

        let padder_v = Frame::filled(
            self.image_width_with_marker - self.image_width,
            img.height(),
            WHITE,
        )?;
        let mut padder_v = padder_v;
        let marker2 = markers::render(markers::MARKER_IDS[2], self.fiducial_marker_size)?;
        padder_v.paste(&marker2, self.block_size / 2, 0)?;

        let img_vpad = img.hconcat(&padder_v)?;

        let padder_h = Frame::filled(self.image_width_with_marker, self.block_size / 2, WHITE)?;
        let padder_top = Frame::filled(self.image_width_with_marker, TOP_PAD_ROWS, WHITE)?;

        let assembled = padder_top.vconcat(&img_vpad)?.vconcat(&padder_h)?;
        assembled.vconcat(&data_strip)?.vconcat(&padder_h)
    }

    /// Wraps `img` with the same geometry as [`Self::encoded_data_as_image`]
    /// but leaves the data strip blank and omits the markers; used for frames
    /// that fall outside the embed interval.
    pub fn encode_no_data(&self, img: &Frame) -> Result<Frame> {
        if img.width() != self.image_width {
            return Err(Error::ShapeError(format!(
                "expected {} cols in the image, got {} instead",
                self.image_width,
                img.width()
            )));
        }
        self.blank_strip_with_padder(img)
    }
}

/// Decodes a raw byte buffer into the original payload string, independent
/// of any particular [`DataEmbed`] geometry: the metadata header recovered
/// from the stream itself carries everything needed to know how much more
/// to decode. Used both by [`DataEmbed::decode_data`] and directly by the
/// fiducial detector, which recovers a data buffer before it has committed
/// to a geometry.
pub fn decode_data(enc_data: &[u8]) -> Result<String> {
    let shrunk = bitexpand::shrink(enc_data, EXPANSION)?;
    let metadata = DataEmbed::decode_metadata_from(&shrunk)?;
    let original_len = METADATA_LEN + metadata.compressed_payload_len as usize;

    let mut decoded = Vec::with_capacity(original_len);
    let mut ptr = 0usize;
    while decoded.len() < original_len {
        if ptr + rs::CODE_LENGTH > shrunk.len() {
            return Err(Error::TruncationError {
                got: decoded.len(),
                expected: original_len,
            });
        }
        let mut block = [0u8; rs::CODE_LENGTH];
        block.copy_from_slice(&shrunk[ptr..ptr + rs::CODE_LENGTH]);
        decoded.extend_from_slice(&rs::decode_block(&block)?);
        ptr += rs::CODE_LENGTH;
    }

    let compressed = &decoded[METADATA_LEN..original_len];
    let mut decompressor = DeflateDecoder::new(compressed);
    let mut payload = String::new();
    decompressor.read_to_string(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod test {
    use super::*;

    fn geometry() -> DataEmbed {
        DataEmbed::new(8, 4, 1280).unwrap()
    }

    #[test]
    fn geometry_matches_reference_numbers() {
        let e = geometry();
        assert_eq!(e.num_blocks_per_row(), 155);
        assert_eq!(e.num_bytes_per_row, 465);
        assert_eq!(e.num_bytes_total, 1860);
    }

    #[test]
    fn data_round_trip() {
        let e = geometry();
        let payload = "hello, vidscramble";
        let enc = e.encode_data(payload).unwrap();
        let decoded = e.decode_data(&enc).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn capacity_error_is_reported() {
        let e = DataEmbed::new(2, 4, 64).unwrap();
        let big_payload = "x".repeat(10_000);
        assert!(matches!(
            e.encode_data(&big_payload),
            Err(Error::CapacityError { .. })
        ));
    }

    #[test]
    fn rejects_odd_block_size() {
        assert!(DataEmbed::new(3, 4, 1280).is_err());
    }

    #[test]
    fn rejects_too_narrow_image() {
        assert!(DataEmbed::new(8, 4, 10).is_err());
    }
}
