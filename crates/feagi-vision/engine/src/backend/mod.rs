// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Compute Backend Abstraction
//!
//! Provides a unified interface for the execution backbones (sequential CPU,
//! thread-pool CPU, GPU). The execution context drives every backend through the
//! same frame protocol:
//!
//! 1. `upload_infrastructure` when a pipeline is bound (filters, KWTA parameters)
//! 2. `begin_frame` at the start of every run (images)
//! 3. `dispatch` per operation, with `barrier` between dependent operations
//! 4. `end_frame` before results are read
//!
//! The host registry stays authoritative: when `end_frame` returns, every output
//! slot holds its final values.

mod cpu;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use cpu::{CPUBackend, Parallelism};
#[cfg(feature = "gpu")]
pub use wgpu_backend::WGPUBackend;

use feagi_vision_core::{BufferRegistry, KwtaOutcome, Operation, Result, VisionError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Compute backend trait - abstracts CPU vs GPU execution
pub trait ComputeBackend: Send + Sync {
    /// Get backend name for logging/debugging
    fn backend_name(&self) -> &str;

    /// Concrete backbone this backend runs on
    fn backend_type(&self) -> BackendType;

    /// Upload data that only changes when the pipeline is reconfigured.
    ///
    /// Called on bind and whenever the bound pipeline's version moves.
    fn upload_infrastructure(&mut self, _buffers: &BufferRegistry) -> Result<()> {
        Ok(())
    }

    /// Upload per-frame inputs (images)
    fn begin_frame(&mut self, _buffers: &BufferRegistry) -> Result<()> {
        Ok(())
    }

    /// Execute one operation for every batch entry.
    ///
    /// Returns per-batch KWTA outcomes for `Kwta`, empty otherwise.
    fn dispatch(&mut self, op: &Operation, buffers: &mut BufferRegistry)
        -> Result<Vec<KwtaOutcome>>;

    /// Wait until all work dispatched so far is visible to later operations
    fn barrier(&mut self) -> Result<()> {
        Ok(())
    }

    /// Make every output visible in the host registry
    fn end_frame(&mut self, _buffers: &mut BufferRegistry) -> Result<()> {
        Ok(())
    }
}

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// Rayon thread pool, rows distributed across workers
    CPU,

    /// Single thread, rows in order; always available
    Sequential,

    /// GPU via WGPU (Metal/Vulkan/DirectX - cross-platform)
    #[cfg(feature = "gpu")]
    WGPU,

    /// Auto-select based on pipeline work and hardware availability
    Auto,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::CPU => write!(f, "CPU"),
            BackendType::Sequential => write!(f, "Sequential"),
            #[cfg(feature = "gpu")]
            BackendType::WGPU => write!(f, "WGPU"),
            BackendType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "parallel" => Ok(BackendType::CPU),
            "sequential" | "serial" => Ok(BackendType::Sequential),
            #[cfg(feature = "gpu")]
            "wgpu" | "gpu" => Ok(BackendType::WGPU),
            "auto" => Ok(BackendType::Auto),
            _ => Err(VisionError::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration for backend construction and auto-selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Minimum output elements per frame before the GPU is considered (default: 4,000,000)
    pub gpu_min_work_items: usize,

    /// Worker threads for the CPU backend (`None` = rayon's global pool)
    pub threads: Option<usize>,

    /// Force CPU even if GPU would be beneficial
    pub force_cpu: bool,

    /// Force GPU even if CPU would be better (for testing)
    pub force_gpu: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            // A 256x256 Gabor stage (4 angles, 6x6) is ~2.4M multiply-adds per frame
            gpu_min_work_items: 4_000_000,
            threads: None,
            force_cpu: false,
            force_gpu: false,
        }
    }
}

/// Backend selection decision with rationale
#[derive(Debug, Clone)]
pub struct BackendDecision {
    pub backend_type: BackendType,
    pub reason: String,
    pub estimated_speedup: f32,
}

/// Auto-select a backend from per-frame work and hardware availability
pub fn select_backend(work_items: usize, config: &BackendConfig) -> BackendDecision {
    if config.force_cpu {
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: "Forced CPU via configuration".to_string(),
            estimated_speedup: 1.0,
        };
    }

    #[cfg(feature = "gpu")]
    {
        if config.force_gpu || work_items >= config.gpu_min_work_items {
            if is_gpu_available() {
                let speedup = estimate_gpu_speedup(work_items);
                if config.force_gpu || speedup > 1.5 {
                    return BackendDecision {
                        backend_type: BackendType::WGPU,
                        reason: if config.force_gpu {
                            "Forced GPU via configuration".to_string()
                        } else {
                            format!("Large pipeline ({} work items) benefits from GPU", work_items)
                        },
                        estimated_speedup: speedup,
                    };
                }
            } else if config.force_gpu {
                return BackendDecision {
                    backend_type: BackendType::CPU,
                    reason: "GPU forced but not available, falling back to CPU".to_string(),
                    estimated_speedup: 1.0,
                };
            }
        }
    }

    BackendDecision {
        backend_type: BackendType::CPU,
        reason: format!(
            "Small pipeline ({} work items) or GPU not available",
            work_items
        ),
        estimated_speedup: 1.0,
    }
}

/// Check if a GPU adapter can be acquired
#[cfg(feature = "gpu")]
pub fn is_gpu_available() -> bool {
    use wgpu::Backends;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: Backends::all(),
        ..Default::default()
    });

    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .is_some()
}

/// Check if a GPU adapter can be acquired
#[cfg(not(feature = "gpu"))]
pub fn is_gpu_available() -> bool {
    false
}

/// Estimate GPU speedup from per-frame work.
///
/// Only convolutions run on the device, and each one pays an upload and a
/// readback, so small frames never win.
#[cfg(feature = "gpu")]
fn estimate_gpu_speedup(work_items: usize) -> f32 {
    let work = work_items as f32;
    // CPU: ~2 GFLOP/s per core effective, assume 8 cores
    let cpu_us = work / 16_000.0;
    // GPU: ~1 TFLOP/s effective plus ~150us submit/readback per frame
    let gpu_us = work / 1_000_000.0 + 150.0;
    (cpu_us / gpu_us).clamp(0.1, 100.0)
}

/// Create backend based on type
pub fn create_backend(
    backend_type: BackendType,
    work_items: usize,
    config: &BackendConfig,
) -> Result<Box<dyn ComputeBackend>> {
    let actual_type = if backend_type == BackendType::Auto {
        let decision = select_backend(work_items, config);
        info!(
            "Backend auto-selection: {} ({})",
            decision.backend_type, decision.reason
        );
        if decision.estimated_speedup > 1.0 {
            info!("   Estimated speedup: {:.1}x", decision.estimated_speedup);
        }
        decision.backend_type
    } else {
        backend_type
    };

    match actual_type {
        BackendType::CPU => {
            let backend = match config.threads {
                Some(threads) => CPUBackend::with_threads(threads)?,
                None => CPUBackend::new(),
            };
            info!("Using {} backend", backend.backend_name());
            Ok(Box::new(backend))
        }
        BackendType::Sequential => {
            info!("Using sequential CPU backend");
            Ok(Box::new(CPUBackend::sequential()))
        }
        #[cfg(feature = "gpu")]
        BackendType::WGPU => match WGPUBackend::new() {
            Ok(backend) => {
                info!("Using {} backend", backend.backend_name());
                Ok(Box::new(backend))
            }
            Err(e) => {
                warn!("WGPU backend unavailable ({}), falling back to CPU", e);
                Ok(Box::new(CPUBackend::new()))
            }
        },
        BackendType::Auto => {
            warn!("Backend type Auto survived selection, using CPU");
            Ok(Box::new(CPUBackend::new()))
        }
    }
}
