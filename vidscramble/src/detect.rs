// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Locates the three fiducial marker tiles in a received frame and refines
//! the block pitch against scale drift introduced by a lossy video
//! transport, then reads the embedded descriptor back out.

use crate::embed;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::markers;
use crate::pipeline::ImageDataTransform;
use crate::rs;

const MIN_CONFIDENCE: f64 = 0.85;
const MIN_BLOCK_SIZE_ESTIMATE: f64 = 2.0;
const MAX_SWEEP_STEPS: i32 = 10;
const SWEEP_STEP: f64 = 0.01;
const MAX_NUM_ROWS: u32 = 24;
const MAX_NUM_COLS: u32 = 960;

#[cfg(feature = "tracing-events")]
use tracing::{info, trace};

/// Brute-force search for a marker tile of an unknown size. Candidate sizes
/// are multiples of 8 (fiducial size is always `4 * block_size`, and
/// `block_size` is required to be even).
fn locate_marker_unknown_size(frame: &Frame, id: u32) -> Option<(u32, u32, u32)> {
    let max_size = frame.width().min(frame.height()) / 2;
    let mut size = 8u32;
    while size <= max_size {
        if let Some(found) = locate_marker_at_size(frame, id, size) {
            return Some(found);
        }
        size += 8;
    }
    None
}

fn locate_marker_at_size(frame: &Frame, id: u32, size: u32) -> Option<(u32, u32, u32)> {
    if size == 0 || size > frame.width() || size > frame.height() {
        return None;
    }
    let stride = (size / 4).max(1);
    let mut y = 0u32;
    while y + size <= frame.height() {
        let mut x = 0u32;
        while x + size <= frame.width() {
            if markers::matches_at(frame, x, y, size, id, MIN_CONFIDENCE) {
                return Some((x, y, size));
            }
            x += stride;
        }
        y += stride;
    }
    None
}

struct MetadataSweepResult {
    num_rows: u32,
    num_blocks_per_row: u32,
    factor: f64,
}

/// Samples one metadata-row of pixels at the given pitch-correction `factor`
/// and tries to recover the header. Returns `None` if the RS block or the
/// sanity checks fail.
fn try_metadata_at_factor(
    frame: &Frame,
    dr_x0: f64,
    dr_y0: f64,
    block_size_x: f64,
    factor: f64,
) -> Option<MetadataSweepResult> {
    let block_size_x_changed = block_size_x * factor;
    // One RS block of metadata, after 4x bit-expansion, packed 3 bytes/pixel.
    let num_px = (rs::CODE_LENGTH * embed::EXPANSION as usize).div_ceil(3);
    let mut raw = Vec::with_capacity(num_px * 3);
    for j in 0..num_px {
        let x = dr_x0 + j as f64 * block_size_x_changed;
        let y = dr_y0;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (xi, yi) = (x.round() as u32, y.round() as u32);
        if xi >= frame.width() || yi >= frame.height() {
            return None;
        }
        raw.extend_from_slice(&frame.get(xi, yi));
    }

    let shrunk = crate::bitexpand::shrink(&raw, embed::EXPANSION).ok()?;
    if shrunk.len() < rs::CODE_LENGTH {
        return None;
    }
    let mut block = [0u8; rs::CODE_LENGTH];
    block.copy_from_slice(&shrunk[..rs::CODE_LENGTH]);
    let decoded = rs::decode_block(&block).ok()?;
    let metadata = crate::framing::decode(&decoded[..crate::framing::METADATA_LEN]).ok()?;

    if metadata.num_rows == 0
        || metadata.num_rows as u32 > MAX_NUM_ROWS
        || metadata.num_blocks_per_row == 0
        || metadata.num_blocks_per_row as u32 > MAX_NUM_COLS
    {
        return None;
    }

    Some(MetadataSweepResult {
        num_rows: metadata.num_rows as u32,
        num_blocks_per_row: metadata.num_blocks_per_row as u32,
        factor,
    })
}

/// Iterates sweep factors in the order `0, +0.01, -0.01, +0.02, -0.02, ...`
/// up to `MAX_SWEEP_STEPS * SWEEP_STEP`.
fn sweep_factors() -> impl Iterator<Item = f64> {
    (0..=MAX_SWEEP_STEPS).flat_map(|t| {
        if t == 0 {
            vec![1.0]
        } else {
            vec![1.0 + t as f64 * SWEEP_STEP, 1.0 - t as f64 * SWEEP_STEP]
        }
    })
}

/// Locates the three fiducial markers, brute-force-sweeps the block pitch
/// correction, and on the first successful candidate returns the recovered
/// geometry together with the decoded pipeline descriptor JSON.
pub fn get_data_extraction_transform(frame: &Frame) -> Result<(ImageDataTransform, String)> {
    let m0 = locate_marker_unknown_size(frame, markers::MARKER_IDS[0])
        .ok_or_else(|| Error::DetectionError("marker 0 not found".into()))?;
    let (x_min_0, y_min_0, x_max_0, y_max_0) = markers::bbox(m0.0, m0.1, m0.2);

    let block_size_x = (x_max_0 - x_min_0) as f64 / 4.0;
    let block_size_y = (y_max_0 - y_min_0) as f64 / 4.0;
    if block_size_x < MIN_BLOCK_SIZE_ESTIMATE || block_size_y < MIN_BLOCK_SIZE_ESTIMATE {
        return Err(Error::DetectionError("degenerate marker 0 bounding box".into()));
    }

    let m1 = locate_marker_at_size(frame, markers::MARKER_IDS[1], m0.2)
        .or_else(|| locate_marker_unknown_size(frame, markers::MARKER_IDS[1]))
        .ok_or_else(|| Error::DetectionError("marker 1 not found".into()))?;
    let (x_min_1, y_min_1, _x_max_1, y_max_1) = markers::bbox(m1.0, m1.1, m1.2);

    let m2 = locate_marker_at_size(frame, markers::MARKER_IDS[2], m0.2)
        .or_else(|| locate_marker_unknown_size(frame, markers::MARKER_IDS[2]))
        .ok_or_else(|| Error::DetectionError("marker 2 not found".into()))?;
    let (x_min_2, y_min_2, _x_max_2, _y_max_2) = markers::bbox(m2.0, m2.1, m2.2);

    let dr_x0 = x_max_0 as f64 + block_size_x;
    let dr_y0 = y_min_0 as f64;
    let dr_width = x_min_1 as f64 - block_size_x / 2.0 - dr_x0;
    let dr_height = y_max_1 as f64 - y_min_0 as f64;

    let ir_x0 = x_min_0 as f64 - block_size_x / 2.0;
    let ir_y0 = y_min_2 as f64;
    let ir_width = x_min_2 as f64 - block_size_x / 2.0 - ir_x0;
    let ir_height = y_max_1 as f64 - block_size_y / 2.0 - ir_y0;

    for factor in sweep_factors() {
        let Some(meta) = try_metadata_at_factor(frame, dr_x0, dr_y0, block_size_x, factor) else {
            #[cfg(feature = "tracing-events")]
            trace!(factor, "metadata sweep candidate rejected");
            continue;
        };

        let mut transform = ImageDataTransform {
            data_region_x: dr_x0,
            data_region_y: dr_y0,
            data_region_width: dr_width,
            data_region_height: dr_height,
            image_region_x: ir_x0,
            image_region_y: ir_y0,
            image_region_width: ir_width,
            image_region_height: ir_height,
            num_data_rows: meta.num_rows,
            num_data_cols: meta.num_blocks_per_row,
            original_image_region_width: 0,
            original_image_region_height: 0,
            original_data_region_width: 0,
            original_data_region_height: 0,
        };

        let Ok(payload) = extract_data(frame, &transform) else {
            continue;
        };
        let Ok(descriptor) = serde_json::from_str::<serde_json::Value>(&payload) else {
            continue;
        };
        let state = descriptor.get("state");
        let get_u32 = |field: &str| -> Option<u32> {
            state
                .and_then(|s| s.get(field))
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
        };
        let (Some(owwd), Some(ohwd), Some(drw), Some(drh)) = (
            get_u32("output_width_wo_data"),
            get_u32("output_height_wo_data"),
            get_u32("data_region_width"),
            get_u32("data_region_height"),
        ) else {
            continue;
        };

        transform.original_image_region_width = owwd;
        transform.original_image_region_height = ohwd;
        transform.original_data_region_width = drw;
        transform.original_data_region_height = drh;

        #[cfg(feature = "tracing-events")]
        info!(factor, "fiducial detection succeeded");

        return Ok((transform, payload));
    }

    Err(Error::DetectionError(
        "no block-pitch correction factor produced a valid metadata header".into(),
    ))
}

/// Reads one pixel at the center of every data block described by
/// `transform` and decodes the resulting buffer.
pub fn extract_data(frame: &Frame, transform: &ImageDataTransform) -> Result<String> {
    if transform.num_data_rows == 0 || transform.num_data_cols == 0 {
        return Err(Error::ShapeError("empty data region".into()));
    }
    let block_w = transform.data_region_width / transform.num_data_cols as f64;
    let block_h = transform.data_region_height / transform.num_data_rows as f64;

    let mut raw = Vec::with_capacity((transform.num_data_rows * transform.num_data_cols * 3) as usize);
    for row in 0..transform.num_data_rows {
        for col in 0..transform.num_data_cols {
            let x = transform.data_region_x + (col as f64 + 0.5) * block_w;
            let y = transform.data_region_y + (row as f64 + 0.5) * block_h;
            let xi = (x.round() as i64).clamp(0, frame.width() as i64 - 1) as u32;
            let yi = (y.round() as i64).clamp(0, frame.height() as i64 - 1) as u32;
            raw.extend_from_slice(&frame.get(xi, yi));
        }
    }

    embed::decode_data(&raw)
}

/// Crops the scrambled-image region out of `frame` (reflect-padding past the
/// frame edges if the detected region extends beyond it) and resizes it back
/// to the pre-embed dimensions recorded in `transform`.
pub fn extract_image_region(frame: &Frame, transform: &ImageDataTransform) -> Result<Frame> {
    let x = transform.image_region_x.round() as i64;
    let y = transform.image_region_y.round() as i64;
    let w = transform.image_region_width.round().max(1.0) as u32;
    let h = transform.image_region_height.round().max(1.0) as u32;

    let padded = get_padded_roi(frame, x, y, w, h)?;
    if transform.original_image_region_width == 0 || transform.original_image_region_height == 0 {
        return Ok(padded);
    }
    padded.resize(
        transform.original_image_region_width,
        transform.original_image_region_height,
    )
}

/// Returns the `(x, y, w, h)` region of `frame`, reflect-padding any part of
/// the requested rectangle that falls outside the frame bounds.
fn get_padded_roi(frame: &Frame, x: i64, y: i64, w: u32, h: u32) -> Result<Frame> {
    let fw = frame.width() as i64;
    let fh = frame.height() as i64;

    let in_bounds = x >= 0 && y >= 0 && x + w as i64 <= fw && y + h as i64 <= fh;
    if in_bounds {
        return frame.crop(x as u32, y as u32, w, h);
    }

    let pad_left = (-x).max(0) as u32;
    let pad_top = (-y).max(0) as u32;
    let pad_right = ((x + w as i64) - fw).max(0) as u32;
    let pad_bottom = ((y + h as i64) - fh).max(0) as u32;

    let padded = frame.make_border_reflect(pad_top, pad_bottom, pad_left, pad_right)?;
    let crop_x = (x + pad_left as i64).max(0) as u32;
    let crop_y = (y + pad_top as i64).max(0) as u32;
    padded.crop(crop_x, crop_y, w, h)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::embed::DataEmbed;

    #[test]
    fn detects_markers_on_rendered_data_strip() -> Result<()> {
        let embed = DataEmbed::new(8, 4, 64)?;
        let base = Frame::new(64, 64)?;
        let rendered = embed.encoded_data_as_image(&base, "{\"steps\":[]}")?;

        let found = locate_marker_unknown_size(&rendered, markers::MARKER_IDS[0]);
        assert!(found.is_some());
        Ok(())
    }

    #[test]
    fn extract_image_region_pads_out_of_bounds() -> Result<()> {
        let mut frame = Frame::new(8, 8)?;
        frame.set(0, 0, [1, 2, 3]);
        let transform = ImageDataTransform {
            image_region_x: -2.0,
            image_region_y: -2.0,
            image_region_width: 8.0,
            image_region_height: 8.0,
            ..Default::default()
        };
        let region = extract_image_region(&frame, &transform)?;
        assert_eq!(region.width(), 8);
        assert_eq!(region.height(), 8);
        Ok(())
    }
}
