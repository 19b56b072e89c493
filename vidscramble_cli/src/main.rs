// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use image::RgbImage;
use vidscramble::{Frame, ImageShift, ImageTranspose, Pipeline, RowMix, RowShuffle, ScrambleStep};

/// Builds and drives the reversible scramble-and-embed pipeline over a
/// directory of numbered PNG frames (the stand-in for real video file I/O,
/// which is out of scope for this crate).
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scramble a frame sequence and embed the pipeline descriptor.
    Encode(EncodeArgs),
    /// Detect the embedded descriptor and reverse the scramble.
    Decode(DecodeArgs),
}

#[derive(Args)]
struct EncodeArgs {
    /// Directory containing `frame_%04d.png` source frames.
    input_dir: PathBuf,

    /// Directory to write the scrambled, embedded frames into.
    output_dir: PathBuf,

    /// Path to a JSON pipeline descriptor (overrides the step flags below).
    #[arg(long)]
    descriptor: Option<PathBuf>,

    /// Apply an `ImageTranspose` step.
    #[arg(long)]
    transpose: bool,

    /// Apply a `RowShuffle` step: `ROW_GROUP_SIZE SEED`.
    #[arg(long, num_args = 2, value_names = ["ROW_GROUP_SIZE", "SEED"])]
    row_shuffle: Option<Vec<u32>>,

    /// Apply a `RowMix` step: `ROW_GROUP_SIZE SEED`.
    #[arg(long, num_args = 2, value_names = ["ROW_GROUP_SIZE", "SEED"])]
    row_mix: Option<Vec<u32>>,

    /// Apply an `ImageShift` step: `SX SY`.
    #[arg(long, num_args = 2, value_names = ["SX", "SY"])]
    shift: Option<Vec<i64>>,

    /// Data-embed block size in pixels (must be even, >= 2).
    #[arg(long, default_value_t = 8)]
    block_size: u32,

    /// Number of rows in the data-embed block grid (>= 4).
    #[arg(long, default_value_t = 4)]
    num_rows: u32,

    /// Embed the descriptor only every `INTERVAL`-th frame.
    #[arg(long, default_value_t = 1)]
    interval: u32,
}

#[derive(Args)]
struct DecodeArgs {
    /// Directory containing received `frame_%04d.png` frames.
    input_dir: PathBuf,

    /// Directory to write the recovered frames into.
    output_dir: PathBuf,
}

fn numbered_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .wrap_err_with(|| format!("failed to read frame directory {dir:?}"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(eyre!("no .png frames found in {dir:?}"));
    }
    Ok(paths)
}

fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .wrap_err_with(|| format!("failed to read frame {path:?}"))?
        .to_rgb8();
    Ok(Frame::from_rgb_image(img))
}

fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    let img: &RgbImage = frame.as_rgb_image();
    img.save(path)
        .wrap_err_with(|| format!("failed to write frame {path:?}"))
}

fn build_steps_from_flags(args: &EncodeArgs) -> Result<Vec<Box<dyn ScrambleStep>>> {
    let mut steps: Vec<Box<dyn ScrambleStep>> = Vec::new();
    if args.transpose {
        steps.push(Box::new(ImageTranspose::new()));
    }
    if let Some(v) = &args.row_shuffle {
        steps.push(Box::new(RowShuffle::new(v[0], v[1])?));
    }
    if let Some(v) = &args.row_mix {
        steps.push(Box::new(RowMix::new(v[0], v[1])?));
    }
    if let Some(v) = &args.shift {
        steps.push(Box::new(ImageShift::new(v[0], v[1])));
    }
    Ok(steps)
}

fn build_pipeline(args: &EncodeArgs) -> Result<Pipeline> {
    if let Some(path) = &args.descriptor {
        let json = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read pipeline descriptor {path:?}"))?;
        let mut pipeline =
            vidscramble::parser::parse(&json).wrap_err("failed to parse pipeline descriptor")?;
        pipeline.set_data_embed_interval(args.interval)?;
        return Ok(pipeline);
    }
    let steps = build_steps_from_flags(args)?;
    let mut pipeline = Pipeline::new(steps, args.block_size, args.num_rows);
    pipeline.set_data_embed_interval(args.interval)?;
    Ok(pipeline)
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    fs::create_dir_all(&args.output_dir)
        .wrap_err_with(|| format!("failed to create output directory {:?}", args.output_dir))?;

    let mut pipeline = build_pipeline(&args)?;
    let frame_paths = numbered_frames(&args.input_dir)?;

    let probe = load_frame(&frame_paths[0])?;
    pipeline.fit(&probe)?;

    for path in &frame_paths {
        let frame = load_frame(path)?;
        let out = pipeline
            .transform(&frame)
            .wrap_err_with(|| format!("failed to transform frame {path:?}"))?;
        let out_path = args.output_dir.join(path.file_name().unwrap());
        save_frame(&out, &out_path)?;
        tracing::debug!(frame = %path.display(), "encoded frame");
    }

    tracing::info!(frames = frame_paths.len(), "encode complete");
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    fs::create_dir_all(&args.output_dir)
        .wrap_err_with(|| format!("failed to create output directory {:?}", args.output_dir))?;

    let frame_paths = numbered_frames(&args.input_dir)?;
    let mut pipeline: Option<Pipeline> = None;

    for path in &frame_paths {
        let frame = load_frame(path)?;

        let (transform, descriptor_json) = match vidscramble::detect::get_data_extraction_transform(&frame) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(frame = %path.display(), error = %err, "fiducial detection failed, skipping frame");
                continue;
            }
        };

        let descriptor: serde_json::Value = serde_json::from_str(&descriptor_json)
            .wrap_err_with(|| format!("malformed descriptor recovered from {path:?}"))?;

        if pipeline.is_none() {
            let mut p = vidscramble::parser::parse(&descriptor_json)
                .wrap_err("failed to parse recovered pipeline descriptor")?;
            let input_width = descriptor["state"]["input_width"]
                .as_u64()
                .ok_or_else(|| eyre!("descriptor missing state.input_width"))? as u32;
            let input_height = descriptor["state"]["input_height"]
                .as_u64()
                .ok_or_else(|| eyre!("descriptor missing state.input_height"))? as u32;
            let probe = Frame::new(input_width, input_height)?;
            p.fit(&probe)?;
            pipeline = Some(p);
        }
        let pipeline = pipeline.as_mut().unwrap();
        pipeline.sync_state(&descriptor)?;

        let out = pipeline
            .inverse_transform(&frame, &transform)
            .wrap_err_with(|| format!("failed to invert frame {path:?}"))?;
        let out_path = args.output_dir.join(path.file_name().unwrap());
        save_frame(&out, &out_path)?;
        tracing::debug!(frame = %path.display(), "decoded frame");
    }

    if pipeline.is_none() {
        return Err(eyre!("no frame in {:?} yielded a decodable descriptor", args.input_dir));
    }

    tracing::info!(frames = frame_paths.len(), "decode complete");
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    #[cfg(feature = "tracing-subscriber")]
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env())
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Command::Encode(args) => run_encode(args),
        Command::Decode(args) => run_decode(args),
    }
}
