// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # WGPU Backend
//!
//! Cross-platform GPU backend (Metal/Vulkan/DirectX 12).
//!
//! ## Residency
//! - **Filters**: uploaded on `upload_infrastructure`, reused across frames
//! - **Images**: uploaded on `begin_frame`; re-uploaded before a GPU operation
//!   whenever a host operation has written an image slot since
//! - **Values**: host-resident; GPU outputs are read back into the registry as
//!   soon as an operation completes
//!
//! `ConvolveImage` and `LogValues` run as compute shaders. Every other operation
//! runs on the host operator bodies over rayon's global pool.

use feagi_vision_core::{
    operators, BufferRegistry, Geometry, KwtaOutcome, OpKind, Operation, Result, VisionError,
    POLARITIES,
};
use ndarray::{s, ArrayView4, ArrayView5, Dimension};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use super::{BackendType, ComputeBackend, Parallelism};

const WORKGROUP_SIZE: u32 = 64;
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Uniforms for `convolve_image.wgsl` (layout must match the shader)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ConvUniform {
    image_base: u32,
    image_batch_stride: u32,
    image_row_stride: u32,
    window_y0: u32,
    window_x0: u32,
    spacing_y: u32,
    spacing_x: u32,
    filter_base: u32,
    filter_stride: u32,
    filter_row_stride: u32,
    filter_y: u32,
    filter_x: u32,
    out_y: u32,
    out_x: u32,
    filter_count: u32,
    batch: u32,
    gain: f32,
    dispatch_width: u32,
    _pad0: u32,
    _pad1: u32,
}

/// Uniforms for `log_values.wgsl`
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LogUniform {
    count: u32,
    gain: f32,
    dispatch_width: u32,
    _pad: u32,
}

/// WGPU backend for GPU acceleration
pub struct WGPUBackend {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    convolve_pipeline: wgpu::ComputePipeline,
    log_pipeline: wgpu::ComputePipeline,

    filters: Option<wgpu::Buffer>,
    filters_shape: [usize; 4],
    images: Option<wgpu::Buffer>,
    images_shape: [usize; 5],
    /// A host operation wrote an image slot after the last upload
    images_dirty: bool,

    host_rows: Parallelism,
}

impl WGPUBackend {
    /// Acquire a GPU and compile the compute pipelines
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| VisionError::Backend("Failed to find WGPU adapter".to_string()))?;

        let adapter_info = adapter.get_info();
        let name = format!("WGPU ({} - {:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("FEAGI Vision Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| VisionError::Backend(format!("Failed to create device: {}", e)))?;

        let convolve_pipeline = Self::create_pipeline(
            &device,
            "Convolve Image",
            include_str!("shaders/convolve_image.wgsl"),
            "convolve_main",
        );
        let log_pipeline = Self::create_pipeline(
            &device,
            "Log Values",
            include_str!("shaders/log_values.wgsl"),
            "log_main",
        );

        Ok(Self {
            name,
            device,
            queue,
            convolve_pipeline,
            log_pipeline,
            filters: None,
            filters_shape: [0; 4],
            images: None,
            images_shape: [0; 5],
            images_dirty: true,
            host_rows: Parallelism::Global,
        })
    }

    fn create_pipeline(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        entry_point: &str,
    ) -> wgpu::ComputePipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        // Layout derived from the shader's bindings
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point,
        })
    }

    fn storage_buffer(&self, data: &[f32], label: &str) -> wgpu::Buffer {
        // wgpu rejects zero-sized bindings
        let padded;
        let contents = if data.is_empty() {
            padded = [0.0f32];
            &padded[..]
        } else {
            data
        };
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            })
    }

    fn output_buffer(&self, len: usize, label: &str) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (len.max(1) * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn upload_images(&mut self, buffers: &BufferRegistry) -> Result<()> {
        let data = buffers.images.data().as_standard_layout();
        let flat = data
            .as_slice()
            .ok_or_else(|| VisionError::Backend("images arena is not contiguous".to_string()))?;
        let shape = data.raw_dim();
        self.images_shape.copy_from_slice(shape.slice());
        self.images = Some(self.storage_buffer(flat, "Images"));
        self.images_dirty = false;
        trace!("[WGPU] uploaded {} image floats", flat.len());
        Ok(())
    }

    /// Split `invocations` into a 2D grid of 64-wide workgroups
    fn workgroups(invocations: usize) -> (u32, u32) {
        let groups = ((invocations as u32) + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        if groups <= MAX_WORKGROUPS_PER_DIM {
            (groups.max(1), 1)
        } else {
            let rows = (groups + MAX_WORKGROUPS_PER_DIM - 1) / MAX_WORKGROUPS_PER_DIM;
            (MAX_WORKGROUPS_PER_DIM, rows)
        }
    }

    fn run_pass(
        &self,
        pipeline: &wgpu::ComputePipeline,
        entries: &[wgpu::BindGroupEntry],
        groups: (u32, u32),
        label: &str,
    ) {
        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(groups.0, groups.1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Copy `len` floats out of a GPU buffer (blocking)
    fn read_back(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<f32>> {
        let size = (len * std::mem::size_of::<f32>()) as u64;
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| VisionError::Backend("Failed to receive buffer map result".to_string()))?
            .map_err(|e| VisionError::Backend(format!("Failed to map buffer: {:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let values: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();
        Ok(values)
    }

    #[allow(clippy::too_many_arguments)]
    fn convolve_image(
        &mut self,
        buffers: &mut BufferRegistry,
        input: usize,
        channel: usize,
        filters: usize,
        filter_count: usize,
        gain: f32,
        output: usize,
        geom: &Geometry,
    ) -> Result<()> {
        if self.images_dirty || self.images.is_none() {
            self.upload_images(buffers)?;
        }
        let (Some(images_buf), Some(filters_buf)) = (self.images.as_ref(), self.filters.as_ref())
        else {
            return Err(VisionError::Backend(
                "convolution dispatched before infrastructure upload".to_string(),
            ));
        };

        let [_, batch, channels, height, width] = self.images_shape;
        let [_, bank, kernel_h, kernel_w] = self.filters_shape;
        let (oy, ox) = (geom.output_size.y, geom.output_size.x);
        let (wy0, wx0) = geom.window_origin(0, 0);
        let invocations = batch * oy * ox * filter_count;
        let (gx, gy) = Self::workgroups(invocations);

        let uniform = ConvUniform {
            image_base: ((input * batch * channels + channel) * height * width) as u32,
            image_batch_stride: (channels * height * width) as u32,
            image_row_stride: width as u32,
            window_y0: wy0 as u32,
            window_x0: wx0 as u32,
            spacing_y: geom.spacing.y as u32,
            spacing_x: geom.spacing.x as u32,
            filter_base: (filters * bank * kernel_h * kernel_w) as u32,
            filter_stride: (kernel_h * kernel_w) as u32,
            filter_row_stride: kernel_w as u32,
            filter_y: geom.filter_size.y as u32,
            filter_x: geom.filter_size.x as u32,
            out_y: oy as u32,
            out_x: ox as u32,
            filter_count: filter_count as u32,
            batch: batch as u32,
            gain,
            dispatch_width: gx,
            _pad0: 0,
            _pad1: 0,
        };
        let uniform_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Convolve Uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let out_len = invocations * POLARITIES;
        let out_buf = self.output_buffer(out_len, "Convolve Output");

        self.run_pass(
            &self.convolve_pipeline,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: images_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: filters_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: out_buf.as_entire_binding(),
                },
            ],
            (gx, gy),
            "Convolve Image",
        );

        let result = self.read_back(&out_buf, out_len)?;
        let per_batch = oy * ox * POLARITIES * filter_count;
        for (b, chunk) in result.chunks_exact(per_batch).enumerate() {
            let view = ArrayView4::from_shape((oy, ox, POLARITIES, filter_count), chunk)
                .map_err(|e| VisionError::Backend(e.to_string()))?;
            buffers
                .values
                .data_mut()
                .slice_mut(s![output, b, ..oy, ..ox, .., ..filter_count])
                .assign(&view);
        }
        Ok(())
    }

    fn log_values(
        &mut self,
        buffers: &mut BufferRegistry,
        input: usize,
        output: usize,
        size: (usize, usize),
        features: usize,
        gain: f32,
    ) -> Result<()> {
        let (sy, sx) = size;
        let src = buffers
            .values
            .data()
            .slice(s![input, .., ..sy, ..sx, .., ..features])
            .as_standard_layout()
            .into_owned();
        let shape = src.raw_dim();
        let flat = src
            .as_slice()
            .ok_or_else(|| VisionError::Backend("values slice is not contiguous".to_string()))?;
        let count = flat.len();
        let (gx, gy) = Self::workgroups(count);

        let uniform = LogUniform {
            count: count as u32,
            gain,
            dispatch_width: gx,
            _pad: 0,
        };
        let uniform_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Log Uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let in_buf = self.storage_buffer(flat, "Log Input");
        let out_buf = self.output_buffer(count, "Log Output");

        self.run_pass(
            &self.log_pipeline,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: in_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: out_buf.as_entire_binding(),
                },
            ],
            (gx, gy),
            "Log Values",
        );

        let result = self.read_back(&out_buf, count)?;
        let view = ArrayView5::from_shape(shape, &result)
            .map_err(|e| VisionError::Backend(e.to_string()))?;
        buffers
            .values
            .data_mut()
            .slice_mut(s![output, .., ..sy, ..sx, .., ..features])
            .assign(&view);
        Ok(())
    }
}

impl ComputeBackend for WGPUBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        BackendType::WGPU
    }

    fn upload_infrastructure(&mut self, buffers: &BufferRegistry) -> Result<()> {
        let data = buffers.filters.data().as_standard_layout();
        let flat = data
            .as_slice()
            .ok_or_else(|| VisionError::Backend("filters arena is not contiguous".to_string()))?;
        self.filters_shape.copy_from_slice(data.raw_dim().slice());
        self.filters = Some(self.storage_buffer(flat, "Filters"));
        self.images_dirty = true;
        debug!(
            "[WGPU] uploaded filter arena {:?} ({} floats)",
            self.filters_shape,
            flat.len()
        );
        Ok(())
    }

    fn begin_frame(&mut self, buffers: &BufferRegistry) -> Result<()> {
        self.upload_images(buffers)
    }

    fn dispatch(
        &mut self,
        op: &Operation,
        buffers: &mut BufferRegistry,
    ) -> Result<Vec<KwtaOutcome>> {
        match op {
            Operation::ConvolveImage {
                input,
                channel,
                filters,
                filter_count,
                gain,
                output,
                geom,
            } => {
                self.convolve_image(
                    buffers,
                    input.0,
                    *channel,
                    filters.0,
                    *filter_count,
                    *gain,
                    output.0,
                    geom,
                )?;
                Ok(Vec::new())
            }
            Operation::LogValues {
                input,
                output,
                size,
                features,
                gain,
            } => {
                self.log_values(buffers, input.0, output.0, (size.y, size.x), *features, *gain)?;
                Ok(Vec::new())
            }
            _ => {
                if matches!(
                    op.kind(),
                    OpKind::WrapPad | OpKind::FadePad | OpKind::LmsOpponents | OpKind::LmsComponents
                ) {
                    self.images_dirty = true;
                }
                operators::apply(op, buffers, &self.host_rows)
            }
        }
    }

    fn barrier(&mut self) -> Result<()> {
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}
