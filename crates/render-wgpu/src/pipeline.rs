//! Full-screen pipelines for compiled field programs.
//!
//! One pipeline per program: the WGSL comes from `emit_wgsl`, the scene
//! buffers are uploaded as unfilterable float textures and the output is read
//! back as sRGB bytes.

use std::sync::mpsc;

use glam::Vec3;
use tidewater_common::Viewport;
use tidewater_shade::{
    FRAGMENT_ENTRY, Program, SCENE_COLOR_BINDING, SCENE_DEPTH_BINDING, UNIFORM_BINDING,
    UniformSet, VERTEX_ENTRY, emit_wgsl,
};

use crate::device::GpuContext;
use crate::error::GpuError;

pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Uniform block contents for `program`; never empty, WGSL arrays need a slot.
pub fn uniform_slots(
    program: &Program,
    uniforms: &UniformSet,
) -> Result<Vec<[f32; 4]>, GpuError> {
    let mut slots = program.pack_uniforms(uniforms)?;
    if slots.is_empty() {
        slots.push([0.0; 4]);
    }
    Ok(slots)
}

pub fn color_texels(colors: &[Vec3]) -> Vec<[f32; 4]> {
    colors.iter().map(|c| [c.x, c.y, c.z, 1.0]).collect()
}

/// Row pitch of an RGBA8 readback, rounded up to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// Strip row padding from a mapped readback.
pub fn depad_rows(data: &[u8], width: u32, height: u32, padded: u32) -> Vec<[u8; 4]> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height as usize {
        let start = row * padded as usize;
        let Some(bytes) = data.get(start..start + width as usize * 4) else {
            break;
        };
        pixels.extend(bytes.chunks_exact(4).map(|p| [p[0], p[1], p[2], p[3]]));
    }
    pixels
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    viewport: Viewport,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(viewport),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn extent(viewport: Viewport) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: viewport.width,
        height: viewport.height,
        depth_or_array_layers: 1,
    }
}

fn upload(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    viewport: Viewport,
    bytes: &[u8],
    texel_size: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(viewport.width * texel_size),
            rows_per_image: Some(viewport.height),
        },
        extent(viewport),
    );
}

pub struct FieldPipeline {
    program: Program,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    label: String,
}

impl FieldPipeline {
    /// Build the pipeline inside a validation error scope; a shader the device
    /// rejects is returned as [`GpuError::Validation`].
    pub fn new(device: &wgpu::Device, program: &Program, label: &str) -> Result<Self, GpuError> {
        let source = emit_wgsl(program);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("field_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(SCENE_COLOR_BINDING),
                texture_entry(SCENE_DEPTH_BINDING),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("field_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OUTPUT_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let slots = program.uniforms().len().max(1);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field_uniforms"),
            size: (slots * std::mem::size_of::<[f32; 4]>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Validation(err.to_string()));
        }
        tracing::debug!(label, slots, "field pipeline built");
        Ok(Self {
            program: program.clone(),
            pipeline,
            bind_group_layout,
            uniform_buffer,
            label: label.to_string(),
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Evaluate the program over the whole viewport and read the result back.
    pub fn run(
        &self,
        gpu: &GpuContext,
        viewport: Viewport,
        uniforms: &UniformSet,
        color: &[Vec3],
        depth: &[f32],
    ) -> Result<Vec<[u8; 4]>, GpuError> {
        if viewport.is_empty() {
            return Err(GpuError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let expected = viewport.pixel_count();
        for actual in [color.len(), depth.len()] {
            if actual != expected {
                return Err(GpuError::BufferSize { expected, actual });
            }
        }
        let _span = tracing::info_span!("gpu_pass", label = %self.label).entered();
        let (device, queue) = (&gpu.device, &gpu.queue);
        let slots = uniform_slots(&self.program, uniforms)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&slots));

        let scene_color = create_texture(
            device,
            "scene_color",
            viewport,
            COLOR_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        upload(
            queue,
            &scene_color,
            viewport,
            bytemuck::cast_slice(&color_texels(color)),
            16,
        );
        let scene_depth = create_texture(
            device,
            "scene_depth",
            viewport,
            DEPTH_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        upload(queue, &scene_depth, viewport, bytemuck::cast_slice(depth), 4);
        let output = create_texture(
            device,
            "field_output",
            viewport,
            OUTPUT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );

        let color_view = scene_color.create_view(&Default::default());
        let depth_view = scene_depth.create_view(&Default::default());
        let output_view = output.create_view(&Default::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("field_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: SCENE_COLOR_BINDING,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: SCENE_DEPTH_BINDING,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
            ],
        });

        let padded = padded_bytes_per_row(viewport.width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field_readback"),
            size: padded as u64 * viewport.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("field_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("field_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &output,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(viewport.height),
                },
            },
            extent(viewport),
        );
        queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Validation(err.to_string()));
        }

        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| GpuError::MapCallbackDropped)??;

        let pixels = {
            let data = slice.get_mapped_range();
            depad_rows(&data, viewport.width, viewport.height, padded)
        };
        readback.unmap();
        Ok(pixels)
    }
}
