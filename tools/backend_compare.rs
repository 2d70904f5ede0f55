// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Backend comparison tool.
//!
//! Runs the same DoG pipeline on every available backend, then reports per-frame
//! timings and the largest absolute output difference from the sequential backbone.

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use feagi_observability::parse_debug_flags;
use feagi_vision::prelude::*;
use feagi_vision::settings;
use feagi_vision::vision_core::testing::{bar_image, dog_bank, DOG_NET};
use feagi_vision_engine::{create_backend, is_gpu_available};
use ndarray::{s, Array4};
use serde_json::json;
use tracing::info;

struct Args {
    size: usize,
    frames: usize,
    batch: usize,
    config: Option<PathBuf>,
    json: bool,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: backend_compare [--size <px>] [--frames <n>] [--batch <n>] \
         [--config <path>] [--json]\n\n\
         Defaults:\n\
         - size: 256\n\
         - frames: 10\n\
         - batch: 1\n"
    );
    process::exit(2);
}

fn next_number(args: &mut impl Iterator<Item = String>) -> usize {
    args.next()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| usage_and_exit())
}

fn parse_args() -> Args {
    let mut parsed = Args {
        size: 256,
        frames: 10,
        batch: 1,
        config: None,
        json: false,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--size" => parsed.size = next_number(&mut args),
            "--frames" => parsed.frames = next_number(&mut args),
            "--batch" => parsed.batch = next_number(&mut args),
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.config = Some(PathBuf::from(v));
            }
            "--json" => parsed.json = true,
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }
    if parsed.size < 16 || parsed.frames == 0 || parsed.batch == 0 {
        usage_and_exit();
    }
    parsed
}

#[cfg(feature = "gpu")]
fn gpu_candidate() -> Option<BackendType> {
    is_gpu_available().then_some(BackendType::WGPU)
}

#[cfg(not(feature = "gpu"))]
fn gpu_candidate() -> Option<BackendType> {
    None
}

struct Measured {
    backend: BackendType,
    output: Array4<f32>,
    mean_us: f64,
}

fn run_backend(backend: BackendType, args: &Args, threads: Option<usize>) -> Result<Measured> {
    let content = Dims2::splat(args.size);
    let bank = dog_bank(12, 0.125, 0.25);
    let mut dog = DogGrey::configure(
        DogGreyParams::default(),
        content,
        args.batch,
        bank.slice(s![DOG_NET, .., ..]),
    )?;
    for b in 0..args.batch {
        let offset = (b * 7) % (args.size / 2);
        let bar = bar_image(
            content,
            1,
            Dims2::new(args.size / 4 + offset, args.size / 8),
            Dims2::new(args.size / 8, args.size / 2),
            1.0,
            0.1,
        );
        dog.set_image(b, bar.view())?;
    }

    let config = BackendConfig {
        threads,
        ..BackendConfig::default()
    };
    let compute = create_backend(backend, dog.pipeline().work_items(), &config)?;
    let mut ctx = ExecutionContext::new(compute, BarrierPolicy::Full);

    // first run includes the infrastructure upload
    dog.run(&mut ctx)?;
    let start = Instant::now();
    for _ in 0..args.frames {
        dog.run(&mut ctx)?;
    }
    let mean_us = start.elapsed().as_secs_f64() * 1e6 / args.frames as f64;

    let output = dog.output(0)?.to_owned();
    Ok(Measured {
        backend: ctx.backend_type(),
        output,
        mean_us,
    })
}

fn max_abs_diff(a: &Array4<f32>, b: &Array4<f32>) -> Result<f32> {
    if a.dim() != b.dim() {
        bail!("output shapes differ: {:?} vs {:?}", a.dim(), b.dim());
    }
    Ok(a.iter()
        .zip(b.iter())
        .fold(0.0f32, |m, (x, y)| m.max((x - y).abs())))
}

fn main() -> Result<()> {
    let args = parse_args();
    let config = match &args.config {
        Some(path) => feagi_vision::load_config(Some(path), None)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => feagi_vision::load_config_or_default(None)?,
    };
    settings::init_logging(&config, &parse_debug_flags())?;
    let threads = settings::backend_config(&config).threads;

    let candidates = [BackendType::Sequential, BackendType::CPU]
        .into_iter()
        .chain(gpu_candidate());
    info!(
        size = args.size,
        frames = args.frames,
        batch = args.batch,
        gpu_available = is_gpu_available(),
        "comparing backends"
    );

    let mut results = Vec::new();
    for backend in candidates {
        results.push(run_backend(backend, &args, threads)?);
    }
    let reference = &results[0];

    let mut rows = Vec::new();
    for m in &results {
        let diff = max_abs_diff(&reference.output, &m.output)?;
        rows.push(json!({
            "backend": m.backend.to_string(),
            "mean_us": m.mean_us,
            "speedup": reference.mean_us / m.mean_us.max(f64::EPSILON),
            "max_abs_diff": diff,
        }));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!(
            "{:<12} {:>12} {:>9} {:>14}",
            "backend", "mean (us)", "speedup", "max |diff|"
        );
        for row in &rows {
            println!(
                "{:<12} {:>12.1} {:>8.2}x {:>14.3e}",
                row["backend"].as_str().unwrap_or("?"),
                row["mean_us"].as_f64().unwrap_or(0.0),
                row["speedup"].as_f64().unwrap_or(0.0),
                row["max_abs_diff"].as_f64().unwrap_or(0.0),
            );
        }
    }
    Ok(())
}
