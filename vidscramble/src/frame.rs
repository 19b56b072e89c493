// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Thin adapter over `image::RgbImage` providing the handful of whole-frame
//! operations the scramble pipeline and the data-embed codec need: rectangular
//! views, row copies, transpose, resize, border-reflect padding, concatenation
//! and wrap-translate.

use image::{Rgb, RgbImage};

use crate::error::{Error, Result};

/// An owned RGB8 frame. Row-major, three bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    inner: RgbImage,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Result<Frame> {
        if width == 0 || height == 0 {
            return Err(Error::ShapeError(format!(
                "invalid frame size {width}x{height}"
            )));
        }
        Ok(Frame {
            inner: RgbImage::new(width, height),
        })
    }

    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Result<Frame> {
        let mut f = Frame::new(width, height)?;
        for px in f.inner.pixels_mut() {
            *px = Rgb(color);
        }
        Ok(f)
    }

    pub fn from_rgb_image(inner: RgbImage) -> Frame {
        Frame { inner }
    }

    pub fn into_rgb_image(self) -> RgbImage {
        self.inner
    }

    pub fn as_rgb_image(&self) -> &RgbImage {
        &self.inner
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.inner.get_pixel(x, y).0
    }

    pub fn set(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.inner.put_pixel(x, y, Rgb(color));
    }

    fn check_rect(&self, x: u32, y: u32, w: u32, h: u32) -> Result<()> {
        let x_end = x.checked_add(w).ok_or(Error::ShapeError("rect overflow".into()))?;
        let y_end = y.checked_add(h).ok_or(Error::ShapeError("rect overflow".into()))?;
        if x_end > self.width() || y_end > self.height() {
            return Err(Error::ShapeError(format!(
                "rect {w}x{h}+{x}+{y} out of bounds of {}x{} frame",
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }

    /// Returns a freshly-allocated copy of the rectangle `(x, y, w, h)`.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Result<Frame> {
        self.check_rect(x, y, w, h)?;
        let mut out = Frame::new(w, h)?;
        for row in 0..h {
            for col in 0..w {
                out.set(col, row, self.get(x + col, y + row));
            }
        }
        Ok(out)
    }

    /// Pastes `src` into `self` with its top-left corner at `(x, y)`.
    pub fn paste(&mut self, src: &Frame, x: u32, y: u32) -> Result<()> {
        self.check_rect(x, y, src.width(), src.height())?;
        for row in 0..src.height() {
            for col in 0..src.width() {
                self.set(x + col, y + row, src.get(col, row));
            }
        }
        Ok(())
    }

    /// Copies row `src_row` of `src` into row `dst_row` of `self`.
    pub fn copy_row(&mut self, dst_row: u32, src: &Frame, src_row: u32) -> Result<()> {
        if src.width() != self.width() {
            return Err(Error::ShapeError(format!(
                "row width mismatch: {} vs {}",
                src.width(),
                self.width()
            )));
        }
        if src_row >= src.height() || dst_row >= self.height() {
            return Err(Error::ShapeError("row index out of bounds".into()));
        }
        for col in 0..self.width() {
            self.set(col, dst_row, src.get(col, src_row));
        }
        Ok(())
    }

    /// Fills every pixel of the block `(x, y, w, h)` with the value already at `(x, y)`.
    pub fn flat_fill_block(&mut self, x: u32, y: u32, w: u32, h: u32) -> Result<()> {
        self.check_rect(x, y, w, h)?;
        let color = self.get(x, y);
        for row in 0..h {
            for col in 0..w {
                self.set(x + col, y + row, color);
            }
        }
        Ok(())
    }

    pub fn transpose(&self) -> Result<Frame> {
        let mut out = Frame::new(self.height(), self.width())?;
        for row in 0..self.height() {
            for col in 0..self.width() {
                out.set(row, col, self.get(col, row));
            }
        }
        Ok(out)
    }

    /// Bilinear resize to `(w, h)`.
    pub fn resize(&self, w: u32, h: u32) -> Result<Frame> {
        if w == 0 || h == 0 {
            return Err(Error::ShapeError(format!("invalid resize target {w}x{h}")));
        }
        let resized = image::imageops::resize(
            &self.inner,
            w,
            h,
            image::imageops::FilterType::Triangle,
        );
        Ok(Frame::from_rgb_image(resized))
    }

    /// Horizontal concatenation: `self` followed by `other`, same height required.
    pub fn hconcat(&self, other: &Frame) -> Result<Frame> {
        if self.height() != other.height() {
            return Err(Error::ShapeError(format!(
                "hconcat height mismatch: {} vs {}",
                self.height(),
                other.height()
            )));
        }
        let mut out = Frame::new(self.width() + other.width(), self.height())?;
        out.paste(self, 0, 0)?;
        out.paste(other, self.width(), 0)?;
        Ok(out)
    }

    /// Vertical concatenation: `self` stacked above `other`, same width required.
    pub fn vconcat(&self, other: &Frame) -> Result<Frame> {
        if self.width() != other.width() {
            return Err(Error::ShapeError(format!(
                "vconcat width mismatch: {} vs {}",
                self.width(),
                other.width()
            )));
        }
        let mut out = Frame::new(self.width(), self.height() + other.height())?;
        out.paste(self, 0, 0)?;
        out.paste(other, 0, self.height())?;
        Ok(out)
    }

    /// Reflect-pads `self` by `(top, bottom, left, right)` pixels, mirroring
    /// interior rows/columns without repeating the edge pixel.
    pub fn make_border_reflect(&self, top: u32, bottom: u32, left: u32, right: u32) -> Result<Frame> {
        let w = self.width();
        let h = self.height();
        let out_w = w + left + right;
        let out_h = h + top + bottom;
        let mut out = Frame::new(out_w, out_h)?;
        for row in 0..out_h {
            let src_row = reflect_index(row as i64 - top as i64, h);
            for col in 0..out_w {
                let src_col = reflect_index(col as i64 - left as i64, w);
                out.set(col, row, self.get(src_col, src_row));
            }
        }
        Ok(out)
    }

    /// Wraps pixel content by `(sx, sy)`: output (r, c) = input ((r - sy) mod H, (c - sx) mod W).
    pub fn wrap_translate(&self, sx: i64, sy: i64) -> Result<Frame> {
        let w = self.width() as i64;
        let h = self.height() as i64;
        let sx = sx.rem_euclid(w);
        let sy = sy.rem_euclid(h);
        if sx == 0 && sy == 0 {
            return Ok(self.clone());
        }
        let mut out = Frame::new(self.width(), self.height())?;
        for row in 0..self.height() {
            let src_row = ((row as i64 - sy).rem_euclid(h)) as u32;
            for col in 0..self.width() {
                let src_col = ((col as i64 - sx).rem_euclid(w)) as u32;
                out.set(col, row, self.get(src_col, src_row));
            }
        }
        Ok(out)
    }
}

/// Reflects an out-of-range index back into `[0, len)` without duplicating the edge,
/// matching OpenCV's `BORDER_REFLECT_101`-adjacent `BORDER_REFLECT` convention
/// (edge pixel IS duplicated, unlike `_101`).
fn reflect_index(i: i64, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let len = len as i64;
    let period = 2 * len;
    let mut m = i.rem_euclid(period);
    if m >= len {
        m = period - 1 - m;
    }
    m as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crop_roundtrip() -> Result<()> {
        let mut f = Frame::new(4, 4)?;
        f.set(1, 2, [9, 8, 7]);
        let c = f.crop(1, 2, 2, 2)?;
        assert_eq!(c.get(0, 0), [9, 8, 7]);
        Ok(())
    }

    #[test]
    fn transpose_is_involution() -> Result<()> {
        let mut f = Frame::new(3, 5)?;
        f.set(2, 0, [1, 2, 3]);
        let t = f.transpose()?.transpose()?;
        assert_eq!(t, f);
        Ok(())
    }

    #[test]
    fn wrap_translate_zero_is_identity() -> Result<()> {
        let mut f = Frame::new(4, 4)?;
        f.set(1, 1, [5, 6, 7]);
        assert_eq!(f.wrap_translate(0, 0)?, f);
        Ok(())
    }

    #[test]
    fn wrap_translate_roundtrip() -> Result<()> {
        let mut f = Frame::new(8, 6)?;
        for y in 0..6 {
            for x in 0..8 {
                f.set(x, y, [(x * 10) as u8, (y * 10) as u8, 0]);
            }
        }
        let shifted = f.wrap_translate(3, -2)?;
        let back = shifted.wrap_translate(-3, 2)?;
        assert_eq!(back, f);
        Ok(())
    }

    #[test]
    fn reflect_border_preserves_center() -> Result<()> {
        let mut f = Frame::new(4, 4)?;
        f.set(0, 0, [1, 1, 1]);
        let padded = f.make_border_reflect(2, 2, 2, 2)?;
        assert_eq!(padded.width(), 8);
        assert_eq!(padded.height(), 8);
        assert_eq!(padded.get(2, 2), f.get(0, 0));
        Ok(())
    }

    #[test]
    fn hconcat_vconcat_shapes() -> Result<()> {
        let a = Frame::new(3, 2)?;
        let b = Frame::new(5, 2)?;
        let h = a.hconcat(&b)?;
        assert_eq!((h.width(), h.height()), (8, 2));
        let c = Frame::new(3, 4)?;
        let v = a.vconcat(&c)?;
        assert_eq!((v.width(), v.height()), (3, 6));
        Ok(())
    }
}
