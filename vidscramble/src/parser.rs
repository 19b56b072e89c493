// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reconstructs a [`Pipeline`] from its JSON descriptor. Each step record is
//! dispatched by its `name` field to a small constructor table; a missing or
//! mistyped field raises [`Error::ParseError`].

use serde_json::Value;

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::scramble::{ImageShift, ImageTranspose, RowMix, RowShuffle, ScrambleStep};

fn require_u32(step: &Value, name: &str, field: &str) -> Result<u32> {
    step.get(field)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::ParseError(format!("step \"{name}\" missing integer field \"{field}\"")))
}

fn require_i64(step: &Value, name: &str, field: &str) -> Result<i64> {
    step.get(field)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::ParseError(format!("step \"{name}\" missing integer field \"{field}\"")))
}

fn build_step(step: &Value) -> Result<Box<dyn ScrambleStep>> {
    let name = step
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ParseError("step record missing \"name\"".into()))?;

    match name {
        "ImageTranspose" => Ok(Box::new(ImageTranspose::new())),
        "RowShuffle" => {
            let row_group_size = require_u32(step, name, "row_group_size")?;
            let random_seed = require_u32(step, name, "random_seed")?;
            Ok(Box::new(RowShuffle::new(row_group_size, random_seed)?))
        }
        "RowMix" => {
            let row_group_size = require_u32(step, name, "row_group_size")?;
            let random_seed = require_u32(step, name, "random_seed")?;
            Ok(Box::new(RowMix::new(row_group_size, random_seed)?))
        }
        "ImageShift" => {
            let sx = require_i64(step, name, "sx")?;
            let sy = require_i64(step, name, "sy")?;
            Ok(Box::new(ImageShift::new(sx, sy)))
        }
        other => Err(Error::ParseError(format!("unknown step name \"{other}\""))),
    }
}

/// Parses a pipeline descriptor JSON string into a fresh, not-yet-fitted
/// [`Pipeline`].
pub fn parse(json_str: &str) -> Result<Pipeline> {
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| Error::ParseError(e.to_string()))?;

    let steps_value = value
        .get("steps")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::ParseError("missing \"steps\" array".into()))?;
    let steps: Result<Vec<Box<dyn ScrambleStep>>> =
        steps_value.iter().map(build_step).collect();
    let steps = steps?;

    let block_size = value
        .get("data_embed_block_size")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::ParseError("missing \"data_embed_block_size\"".into()))?;
    let num_rows = value
        .get("data_embed_num_rows")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::ParseError("missing \"data_embed_num_rows\"".into()))?;

    let mut pipeline = Pipeline::new(steps, block_size, num_rows);

    if let Some(interval) = value.get("data_embed_interval").and_then(|v| v.as_u64()) {
        pipeline.set_data_embed_interval(interval as u32)?;
    }

    Ok(pipeline)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_all_known_steps() {
        let json = serde_json::json!({
            "steps": [
                {"name": "ImageTranspose"},
                {"name": "RowShuffle", "row_group_size": 8, "random_seed": 42},
                {"name": "RowMix", "row_group_size": 2, "random_seed": 1},
                {"name": "ImageShift", "sx": 1, "sy": -2},
            ],
            "data_embed_block_size": 8,
            "data_embed_num_rows": 4,
        })
        .to_string();
        assert!(parse(&json).is_ok());
    }

    #[test]
    fn rejects_unknown_step() {
        let json = serde_json::json!({
            "steps": [{"name": "Frobnicate"}],
            "data_embed_block_size": 8,
            "data_embed_num_rows": 4,
        })
        .to_string();
        assert!(matches!(parse(&json), Err(Error::ParseError(_))));
    }

    #[test]
    fn rejects_missing_field() {
        let json = serde_json::json!({
            "steps": [{"name": "RowShuffle", "row_group_size": 8}],
            "data_embed_block_size": 8,
            "data_embed_num_rows": 4,
        })
        .to_string();
        assert!(matches!(parse(&json), Err(Error::ParseError(_))));
    }

    #[test]
    fn optional_interval_defaults_to_one() {
        let json = serde_json::json!({
            "steps": [],
            "data_embed_block_size": 8,
            "data_embed_num_rows": 4,
        })
        .to_string();
        let p = parse(&json).unwrap();
        assert_eq!(p.get_data_embed_interval(), 1);
    }
}
