// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigError(String),
    #[error("operation requires fit() to be called first")]
    NotFitted,
    #[error("unexpected image shape: {0}")]
    ShapeError(String),
    #[error("payload of {needed} bytes exceeds block-grid capacity of {capacity} bytes")]
    CapacityError { needed: usize, capacity: usize },
    #[error("Reed-Solomon block could not be corrected ({errors} errors found, max 1)")]
    RsFailure { errors: usize },
    #[error("byte count {0} is not a multiple of the expansion factor")]
    LayoutError(usize),
    #[error("invalid metadata frame: expected {expected} bytes, got {actual}")]
    FramingError { expected: usize, actual: usize },
    #[error("encoded stream ended after {got} bytes, expected at least {expected}")]
    TruncationError { got: usize, expected: usize },
    #[error("fiducial detection failed: {0}")]
    DetectionError(String),
    #[error("could not parse pipeline descriptor: {0}")]
    ParseError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
