// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The four reversible scramble steps: [`ImageTranspose`], [`RowShuffle`],
//! [`RowMix`] and [`ImageShift`]. Each implements [`ScrambleStep`]: `fit` runs
//! once on a probe frame, `transform`/`inverse_transform` run every frame.

use rand::seq::SliceRandom;
use serde_json::json;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::mt19937::Mt19937;
use crate::pipeline::State;

pub trait ScrambleStep: std::fmt::Debug {
    fn fit(&mut self, state: &State, probe: &Frame) -> Result<()>;
    fn transform(&self, state: &State, input: &Frame) -> Result<Frame>;
    fn inverse_transform(&self, state: &State, input: &Frame) -> Result<Frame>;
    fn to_json(&self) -> serde_json::Value;
}

fn permutation(seed: u32, len: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..len).collect();
    let mut rng = Mt19937::new(seed);
    perm.shuffle(&mut rng);
    perm
}

#[derive(Debug, Default)]
pub struct ImageTranspose {
    fitted: bool,
}

impl ImageTranspose {
    pub fn new() -> ImageTranspose {
        ImageTranspose::default()
    }
}

impl ScrambleStep for ImageTranspose {
    fn fit(&mut self, _state: &State, _probe: &Frame) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        input.transpose()
    }

    fn inverse_transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        input.transpose()
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"name": "ImageTranspose"})
    }
}

#[derive(Debug)]
pub struct RowShuffle {
    row_group_size: u32,
    random_seed: u32,
    original_rows: u32,
    forward_permutation: Vec<usize>,
    fitted: bool,
}

impl RowShuffle {
    pub fn new(row_group_size: u32, random_seed: u32) -> Result<RowShuffle> {
        if row_group_size == 0 {
            return Err(Error::ConfigError("row_group_size must be positive".into()));
        }
        Ok(RowShuffle {
            row_group_size,
            random_seed,
            original_rows: 0,
            forward_permutation: Vec::new(),
            fitted: false,
        })
    }

    fn num_row_groups(&self, rows: u32) -> u32 {
        rows.div_ceil(self.row_group_size)
    }

    fn padded_rows(&self, rows: u32) -> u32 {
        self.num_row_groups(rows) * self.row_group_size
    }
}

impl ScrambleStep for RowShuffle {
    fn fit(&mut self, _state: &State, probe: &Frame) -> Result<()> {
        self.original_rows = probe.height();
        let groups = self.num_row_groups(probe.height());
        self.forward_permutation = permutation(self.random_seed, groups as usize);
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let pad = self.padded_rows(input.height()) - input.height();
        let padded = if pad > 0 {
            input.make_border_reflect(0, pad, 0, 0)?
        } else {
            input.clone()
        };
        let groups = self.num_row_groups(input.height());
        let mut out = Frame::new(input.width(), padded.height())?;
        for g in 0..groups {
            let dst_g = self.forward_permutation[g as usize] as u32;
            for r in 0..self.row_group_size {
                out.copy_row(dst_g * self.row_group_size + r, &padded, g * self.row_group_size + r)?;
            }
        }
        Ok(out)
    }

    fn inverse_transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let groups = self.forward_permutation.len() as u32;
        let mut out = Frame::new(input.width(), groups * self.row_group_size)?;
        for g in 0..groups {
            let src_g = self.forward_permutation[g as usize] as u32;
            for r in 0..self.row_group_size {
                let dst_row = g * self.row_group_size + r;
                if dst_row >= self.original_rows {
                    break;
                }
                out.copy_row(dst_row, input, src_g * self.row_group_size + r)?;
            }
        }
        out.crop(0, 0, input.width(), self.original_rows)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "name": "RowShuffle",
            "row_group_size": self.row_group_size,
            "random_seed": self.random_seed,
        })
    }
}

#[derive(Debug)]
pub struct RowMix {
    row_group_size: u32,
    random_seed: u32,
    forward_permutation: Vec<usize>,
    fitted: bool,
}

impl RowMix {
    pub fn new(row_group_size: u32, random_seed: u32) -> Result<RowMix> {
        if row_group_size == 0 {
            return Err(Error::ConfigError("row_group_size must be positive".into()));
        }
        Ok(RowMix {
            row_group_size,
            random_seed,
            forward_permutation: Vec::new(),
            fitted: false,
        })
    }

    /// Number of row groups spanning the *full* (not halved) row count; the
    /// permutation is drawn over this range and applied independently to
    /// `S`- and `D`-destinations via their own (possibly cross-half) group
    /// indices.
    fn num_groups(&self, rows: u32) -> Result<u32> {
        if rows % 2 != 0 {
            return Err(Error::ConfigError("RowMix requires an even row count".into()));
        }
        if rows % self.row_group_size != 0 {
            return Err(Error::ConfigError(
                "RowMix requires the row count to be divisible by row_group_size".into(),
            ));
        }
        Ok(rows / self.row_group_size)
    }
}

fn remap_diff_to_u8(d: i16) -> u8 {
    (if d < 0 { d + 256 } else { d }) as u8
}

fn remap_u8_to_diff(v: u8) -> i16 {
    if v > 127 {
        v as i16 - 256
    } else {
        v as i16
    }
}

impl ScrambleStep for RowMix {
    fn fit(&mut self, _state: &State, probe: &Frame) -> Result<()> {
        let groups = self.num_groups(probe.height())?;
        self.forward_permutation = permutation(self.random_seed, groups as usize);
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let half = input.height() / 2;
        self.num_groups(input.height())?;
        let rgs = self.row_group_size;
        let mut out = Frame::new(input.width(), input.height())?;
        for i in 0..half {
            let s_dst_group = self.forward_permutation[(i / rgs) as usize] as u32;
            let s_row = rgs * s_dst_group + (i % rgs);

            let d_idx = i + half;
            let d_dst_group = self.forward_permutation[(d_idx / rgs) as usize] as u32;
            let d_row = rgs * d_dst_group + (d_idx % rgs);

            for x in 0..input.width() {
                let top = input.get(x, i);
                let bot = input.get(x, half + i);
                let mut s = [0u8; 3];
                let mut d = [0u8; 3];
                for c in 0..3 {
                    let t = top[c] as i16;
                    let b = bot[c] as i16;
                    s[c] = ((t + b) / 2) as u8;
                    d[c] = remap_diff_to_u8((t - b) / 2);
                }
                out.set(x, s_row, s);
                out.set(x, d_row, d);
            }
        }
        Ok(out)
    }

    fn inverse_transform(&self, _state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let half = input.height() / 2;
        let rgs = self.row_group_size;
        let mut out = Frame::new(input.width(), input.height())?;
        for i in 0..half {
            let s_dst_group = self.forward_permutation[(i / rgs) as usize] as u32;
            let s_row = rgs * s_dst_group + (i % rgs);

            let d_idx = i + half;
            let d_dst_group = self.forward_permutation[(d_idx / rgs) as usize] as u32;
            let d_row = rgs * d_dst_group + (d_idx % rgs);

            for x in 0..input.width() {
                let s = input.get(x, s_row);
                let d = input.get(x, d_row);
                let mut top = [0u8; 3];
                let mut bot = [0u8; 3];
                for c in 0..3 {
                    let sv = s[c] as i16;
                    let dv = remap_u8_to_diff(d[c]);
                    top[c] = (sv + dv).clamp(0, 255) as u8;
                    bot[c] = (sv - dv).clamp(0, 255) as u8;
                }
                out.set(x, i, top);
                out.set(x, half + i, bot);
            }
        }
        Ok(out)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "name": "RowMix",
            "row_group_size": self.row_group_size,
            "random_seed": self.random_seed,
        })
    }
}

#[derive(Debug)]
pub struct ImageShift {
    sx: i64,
    sy: i64,
    fitted: bool,
}

impl ImageShift {
    pub fn new(sx: i64, sy: i64) -> ImageShift {
        ImageShift {
            sx,
            sy,
            fitted: false,
        }
    }
}

impl ScrambleStep for ImageShift {
    fn fit(&mut self, _state: &State, _probe: &Frame) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let t = state.timestamp as i64;
        input.wrap_translate(t * self.sx, t * self.sy)
    }

    fn inverse_transform(&self, state: &State, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let t = state.timestamp as i64;
        input.wrap_translate(-t * self.sx, -t * self.sy)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"name": "ImageShift", "sx": self.sx, "sy": self.sy})
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pipeline::State;

    fn state() -> State {
        State::default()
    }

    #[test]
    fn transpose_round_trip() -> Result<()> {
        let mut step = ImageTranspose::new();
        let f = Frame::new(6, 4)?;
        step.fit(&state(), &f)?;
        let out = step.inverse_transform(&state(), &step.transform(&state(), &f)?)?;
        assert_eq!(out.width(), f.width());
        assert_eq!(out.height(), f.height());
        Ok(())
    }

    #[test]
    fn row_shuffle_round_trip() -> Result<()> {
        let mut step = RowShuffle::new(3, 7)?;
        let mut f = Frame::new(4, 10)?;
        for y in 0..10 {
            f.set(0, y, [y as u8, 0, 0]);
        }
        step.fit(&state(), &f)?;
        let shuffled = step.transform(&state(), &f)?;
        let back = step.inverse_transform(&state(), &shuffled)?;
        assert_eq!(back, f);
        Ok(())
    }

    #[test]
    fn row_mix_round_trip_no_rounding_loss_on_even_values() -> Result<()> {
        let mut step = RowMix::new(2, 3)?;
        let mut f = Frame::new(2, 8)?;
        for y in 0..8u32 {
            f.set(0, y, [(y * 2) as u8, 100, 200]);
            f.set(1, y, [10, 20, 30]);
        }
        step.fit(&state(), &f)?;
        let mixed = step.transform(&state(), &f)?;
        let back = step.inverse_transform(&state(), &mixed)?;
        for y in 0..8u32 {
            for x in 0..2u32 {
                let a = f.get(x, y);
                let b = back.get(x, y);
                for c in 0..3 {
                    assert!((a[c] as i16 - b[c] as i16).abs() <= 1);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn image_shift_wraps_by_timestamp() -> Result<()> {
        let mut step = ImageShift::new(1, 0);
        let mut f = Frame::new(4, 3)?;
        f.set(0, 0, [9, 9, 9]);
        let mut st = State::default();
        st.timestamp = 2;
        step.fit(&st, &f)?;
        let shifted = step.transform(&st, &f)?;
        assert_eq!(shifted.get(2, 0), [9, 9, 9]);
        let back = step.inverse_transform(&st, &shifted)?;
        assert_eq!(back, f);
        Ok(())
    }
}
