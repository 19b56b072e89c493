// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reversible image-scrambling pipeline plus the fiducial-coded visual
//! control channel that lets a receiver recover the pipeline's own
//! parameters from a single frame.
//!
//! The embedded channel (metadata framing, Reed-Solomon FEC, bit-expansion,
//! the color-block grid and its fiducial markers) lives in [`framing`],
//! [`rs`], [`bitexpand`], [`markers`] and [`embed`]. The scrambling side
//! (the reversible transforms and the [`pipeline::Pipeline`] that drives
//! them) lives in [`scramble`], [`pipeline`] and [`parser`]. [`detect`] finds
//! the markers in a received frame and reverses the detection-time pitch
//! drift. [`frame`] is the thin pixel-buffer adapter everything else builds
//! on.

pub mod bitexpand;
pub mod detect;
pub mod embed;
pub mod error;
pub mod frame;
pub mod framing;
pub mod markers;
pub mod mt19937;
pub mod parser;
pub mod pipeline;
pub mod rs;
pub mod scramble;

pub use embed::DataEmbed;
pub use error::{Error, Result};
pub use frame::Frame;
pub use pipeline::{ImageDataTransform, Pipeline, State};
pub use scramble::{ImageShift, ImageTranspose, RowMix, RowShuffle, ScrambleStep};
