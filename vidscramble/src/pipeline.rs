// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Orders the scramble steps, carries the shared [`State`], drives
//! fit/transform/inverse, and serializes/reads back the JSON pipeline
//! descriptor that travels inside the embedded data strip.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[cfg(feature = "tracing-events")]
use tracing::debug;

use crate::embed::DataEmbed;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::scramble::ScrambleStep;

/// Shared, pipeline-owned record of dimensions and the frame counter that
/// drives time-varying steps. Read-only to steps; only [`Pipeline`] mutates it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub timestamp: u64,
    pub input_width: u32,
    pub input_height: u32,
    pub output_width_wo_data: u32,
    pub output_height_wo_data: u32,
    pub data_region_width: u32,
    pub data_region_height: u32,
}

/// Geometry recovered by the fiducial detector, describing where the data
/// grid and the scrambled image region sit within a received frame.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ImageDataTransform {
    pub data_region_x: f64,
    pub data_region_y: f64,
    pub data_region_width: f64,
    pub data_region_height: f64,
    pub image_region_x: f64,
    pub image_region_y: f64,
    pub image_region_width: f64,
    pub image_region_height: f64,
    pub num_data_rows: u32,
    pub num_data_cols: u32,
    pub original_image_region_width: u32,
    pub original_image_region_height: u32,
    pub original_data_region_width: u32,
    pub original_data_region_height: u32,
}

pub struct Pipeline {
    steps: Vec<Box<dyn ScrambleStep>>,
    state: State,
    data_embed: Option<DataEmbed>,
    data_embed_block_size: u32,
    data_embed_num_rows: u32,
    data_embed_interval: u32,
    transform_increments_timestamp: bool,
    fitted: bool,
}

impl Pipeline {
    pub fn new(
        steps: Vec<Box<dyn ScrambleStep>>,
        data_embed_block_size: u32,
        data_embed_num_rows: u32,
    ) -> Pipeline {
        Pipeline {
            steps,
            state: State::default(),
            data_embed: None,
            data_embed_block_size,
            data_embed_num_rows,
            data_embed_interval: 1,
            transform_increments_timestamp: true,
            fitted: false,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn get_data_embed_interval(&self) -> u32 {
        self.data_embed_interval
    }

    pub fn set_data_embed_interval(&mut self, interval: u32) -> Result<()> {
        if interval < 1 {
            return Err(Error::ConfigError(
                "data_embed_interval must be at least 1".into(),
            ));
        }
        self.data_embed_interval = interval;
        Ok(())
    }

    pub fn set_timestamp_increment(&mut self, increments: bool) {
        self.transform_increments_timestamp = increments;
    }

    pub fn reset_timestamp(&mut self) {
        self.state.timestamp = 0;
    }

    pub fn increment_timestamp(&mut self) {
        self.state.timestamp += 1;
    }

    /// Requires an RGB8 frame. Runs each step's `fit` then `transform` on a
    /// working copy to discover the post-scramble dimensions, then allocates
    /// the [`DataEmbed`] geometry.
    pub fn fit(&mut self, probe: &Frame) -> Result<()> {
        self.state.input_width = probe.width();
        self.state.input_height = probe.height();
        self.state.timestamp = 0;

        let mut cur = probe.clone();
        for step in self.steps.iter_mut() {
            step.fit(&self.state, &cur)?;
            cur = step.transform(&self.state, &cur)?;
        }
        self.state.output_width_wo_data = cur.width();
        self.state.output_height_wo_data = cur.height();

        let embed = DataEmbed::new(
            self.data_embed_block_size,
            self.data_embed_num_rows,
            cur.width(),
        )?;
        self.state.data_region_width = embed.data_region_width();
        self.state.data_region_height = embed.data_region_height();
        self.data_embed = Some(embed);
        self.fitted = true;
        Ok(())
    }

    /// Runs every step forward in order, then appends the payload strip (or a
    /// blank strip outside the embed interval). Advances `timestamp` if
    /// `set_timestamp_increment` hasn't disabled it.
    pub fn transform(&mut self, input: &Frame) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let embed = self.data_embed.as_ref().expect("fitted implies data_embed");

        let mut cur = input.clone();
        for step in self.steps.iter() {
            cur = step.transform(&self.state, &cur)?;
        }

        let out = if self.state.timestamp % self.data_embed_interval as u64 == 0 {
            embed.encoded_data_as_image(&cur, &self.to_json().to_string())?
        } else {
            embed.encode_no_data(&cur)?
        };

        #[cfg(feature = "tracing-events")]
        debug!(timestamp = self.state.timestamp, "transformed frame");

        if self.transform_increments_timestamp {
            self.state.timestamp += 1;
        }
        Ok(out)
    }

    /// Crops the image region out of `frame` per `transform_info`, resizes it
    /// back to the original pre-embed dimensions, then runs every step's
    /// inverse in reverse order.
    pub fn inverse_transform(
        &mut self,
        frame: &Frame,
        transform_info: &ImageDataTransform,
    ) -> Result<Frame> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let cropped = crate::detect::extract_image_region(frame, transform_info)?;
        let mut cur = cropped;
        for step in self.steps.iter().rev() {
            cur = step.inverse_transform(&self.state, &cur)?;
        }

        #[cfg(feature = "tracing-events")]
        debug!(timestamp = self.state.timestamp, "inverse transformed frame");

        if self.transform_increments_timestamp {
            self.state.timestamp += 1;
        }
        Ok(cur)
    }

    pub fn to_json(&self) -> Value {
        let steps: Vec<Value> = self.steps.iter().map(|s| s.to_json()).collect();
        json!({
            "steps": steps,
            "data_embed_block_size": self.data_embed_block_size,
            "data_embed_num_rows": self.data_embed_num_rows,
            "data_embed_interval": self.data_embed_interval,
            "state": {
                "output_width_wo_data": self.state.output_width_wo_data,
                "output_height_wo_data": self.state.output_height_wo_data,
                "data_region_width": self.state.data_region_width,
                "data_region_height": self.state.data_region_height,
                "input_height": self.state.input_height,
                "input_width": self.state.input_width,
                "timestamp": self.state.timestamp,
            },
        })
    }

    /// Renders a descriptor-only frame of this pipeline's own JSON, using a
    /// blank probe image shaped like the fitted output. Mirrors the
    /// zero-argument overload used to preview a pipeline's wire format.
    pub fn to_json_image(&self) -> Result<Frame> {
        let embed = self
            .data_embed
            .as_ref()
            .ok_or(Error::NotFitted)?;
        let probe = Frame::filled(self.state.output_width_wo_data, self.state.output_height_wo_data, [255, 255, 255])?;
        embed.encoded_data_as_image(&probe, &self.to_json().to_string())
    }

    pub fn to_no_data_image(&self) -> Result<Frame> {
        let embed = self
            .data_embed
            .as_ref()
            .ok_or(Error::NotFitted)?;
        let probe = Frame::filled(self.state.output_width_wo_data, self.state.output_height_wo_data, [255, 255, 255])?;
        embed.encode_no_data(&probe)
    }

    /// Copies only `timestamp` from a received descriptor, matching the
    /// reference behavior of not re-deriving dimensions from received JSON.
    pub fn sync_state(&mut self, descriptor: &Value) -> Result<()> {
        let timestamp = descriptor
            .get("state")
            .and_then(|s| s.get("timestamp"))
            .and_then(|t| t.as_u64())
            .ok_or_else(|| Error::ParseError("missing state.timestamp".into()))?;
        self.state.timestamp = timestamp;
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("fitted", &self.fitted)
            .field("num_steps", &self.steps.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scramble::{ImageShift, ImageTranspose, RowShuffle};

    fn small_pipeline() -> Pipeline {
        let steps: Vec<Box<dyn ScrambleStep>> = vec![
            Box::new(ImageTranspose::new()),
            Box::new(RowShuffle::new(2, 7).unwrap()),
            Box::new(ImageShift::new(1, 0)),
        ];
        Pipeline::new(steps, 4, 4)
    }

    #[test]
    fn fit_sets_dimensions() -> Result<()> {
        let mut p = small_pipeline();
        let probe = Frame::new(64, 32)?;
        p.fit(&probe)?;
        assert_eq!(p.state().input_width, 64);
        assert_eq!(p.state().input_height, 32);
        assert!(p.state().output_width_wo_data > 0);
        Ok(())
    }

    #[test]
    fn transform_before_fit_errors() {
        let mut p = small_pipeline();
        let probe = Frame::new(8, 8).unwrap();
        assert!(matches!(p.transform(&probe), Err(Error::NotFitted)));
    }

    #[test]
    fn json_round_trip_idempotent_after_refit() -> Result<()> {
        let mut p = small_pipeline();
        let probe = Frame::new(64, 32)?;
        p.fit(&probe)?;
        let first = p.to_json();

        let descriptor = crate::parser::parse(&first.to_string())?;
        let mut p2 = descriptor;
        p2.fit(&probe)?;
        let second = p2.to_json();
        assert_eq!(first, second);
        Ok(())
    }
}
