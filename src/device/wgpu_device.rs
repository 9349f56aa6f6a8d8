//! wgpu Graphics Device
//!
//! [`WgpuDevice`] implements [`GraphicsDevice`] on top of a `wgpu::Device` and
//! `wgpu::Queue`.
//!
//! # Resources
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       WgpuDevice                         │
//! │                                                          │
//! │  textures:       SlotMap<TextureHandle, GpuTexture>      │
//! │  render_targets: SlotMap<RenderTargetHandle, Texture..>  │
//! │  pipelines:      SlotMap<PipelineHandle, GpuPipeline>    │
//! │  modules:        xxh3-128(source) → ShaderModule         │
//! │  samplers:       SamplerDesc → Sampler                   │
//! │  uniform_buffers: [Option<Buffer>]  ←── by uniform slot  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Render pipelines are built lazily, once per color target format, the
//! first time a pipeline draws into a target of that format.
//!
//! # Submission
//!
//! Clears and draws are recorded into one command encoder that is created on
//! demand. Call [`WgpuDevice::submit`] after each
//! [`EffectSystem::process`](crate::effects::EffectSystem::process): uniform
//! slots are rewritten on the next call, and queue writes land before any
//! recorded command of the same submission.

use std::borrow::Cow;

use glam::UVec2;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use xxhash_rust::xxh3::xxh3_128;

use super::{
    BackendCaps, CompiledShader, GraphicsDevice, PipelineHandle, QuadDraw, RenderTargetHandle,
    SamplerDesc, ShaderReflection, TextureHandle, TextureInfo, TextureUpload, reflect,
};
use crate::errors::{EffectError, Result};

const RENDER_TARGET_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

const DEPTH_PLACEHOLDER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ─── Internal Types ───────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec2,
    format: wgpu::TextureFormat,
    label: String,
}

impl GpuTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        mip_level_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        Self::from_texture(texture, label)
    }

    fn from_texture(texture: wgpu::Texture, label: &str) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            size: UVec2::new(texture.width(), texture.height()),
            format: texture.format(),
            texture,
            view,
            label: label.to_string(),
        }
    }

    fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }
}

struct GpuPipeline {
    label: String,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    reflection: ShaderReflection,
    /// One render pipeline per color target format.
    variants: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

// ─── Device ───────────────────────────────────────────────────────────────────

/// [`GraphicsDevice`] backed by wgpu.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,

    textures: SlotMap<TextureHandle, GpuTexture>,
    render_targets: SlotMap<RenderTargetHandle, TextureHandle>,
    pipelines: SlotMap<PipelineHandle, GpuPipeline>,

    /// xxh3-128 of WGSL source → compiled module.
    modules: FxHashMap<u128, wgpu::ShaderModule>,
    samplers: FxHashMap<SamplerDesc, wgpu::Sampler>,
    /// Indexed by uniform slot. Slots of draws without a uniform block stay empty.
    uniform_buffers: Vec<Option<wgpu::Buffer>>,

    /// Zero-initialized 1x1 textures, bound where a shader texture is missing.
    placeholder: TextureHandle,
    depth_placeholder: TextureHandle,

    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuDevice {
    /// Wraps an existing device and queue.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let mut textures = SlotMap::with_key();
        let placeholder = textures.insert(GpuTexture::new(
            &device,
            "Effect Placeholder",
            UVec2::ONE,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            1,
        ));
        let depth_placeholder = textures.insert(GpuTexture::new(
            &device,
            "Effect Depth Placeholder",
            UVec2::ONE,
            DEPTH_PLACEHOLDER_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            1,
        ));

        Self {
            device,
            queue,
            textures,
            render_targets: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            modules: FxHashMap::default(),
            samplers: FxHashMap::default(),
            uniform_buffers: Vec::new(),
            placeholder,
            depth_placeholder,
            encoder: None,
        }
    }

    /// Creates a device without a surface, for offscreen processing.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EffectError::DeviceRequest(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Effect Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| EffectError::DeviceRequest(e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers a texture created elsewhere (e.g. the scene color or depth
    /// buffer) so it can be passed to the effect system.
    pub fn import_texture(&mut self, texture: wgpu::Texture, label: &str) -> TextureHandle {
        self.textures.insert(GpuTexture::from_texture(texture, label))
    }

    /// Removes an imported texture without destroying it.
    pub fn forget_texture(&mut self, handle: TextureHandle) -> Option<wgpu::Texture> {
        self.textures.remove(handle).map(|t| t.texture)
    }

    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(handle).map(|t| &t.texture)
    }

    #[must_use]
    pub fn texture_view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(handle).map(|t| &t.view)
    }

    /// Returns the number of cached shader modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Submits all recorded work to the queue.
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    // ─── Internals ────────────────────────────────────────────────────

    fn encoder<'a>(
        device: &wgpu::Device,
        encoder: &'a mut Option<wgpu::CommandEncoder>,
    ) -> &'a mut wgpu::CommandEncoder {
        encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Encoder"),
            })
        })
    }

    fn module(&mut self, label: &str, source: &str) -> wgpu::ShaderModule {
        let hash = xxh3_128(source.as_bytes());
        self.modules
            .entry(hash)
            .or_insert_with(|| {
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label),
                        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
                    })
            })
            .clone()
    }

    fn ensure_sampler(&mut self, desc: SamplerDesc) {
        let device = &self.device;
        self.samplers.entry(desc).or_insert_with(|| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Effect Sampler"),
                address_mode_u: desc.address_mode_u,
                address_mode_v: desc.address_mode_v,
                mag_filter: desc.mag_filter,
                min_filter: desc.min_filter,
                mipmap_filter: desc
                    .mipmap_filter
                    .unwrap_or(wgpu::MipmapFilterMode::Nearest),
                lod_max_clamp: if desc.mipmap_filter.is_some() {
                    32.0
                } else {
                    0.0
                },
                ..Default::default()
            })
        });
    }

    fn uniform_buffer(&mut self, slot: usize, size: u64) -> wgpu::Buffer {
        if self.uniform_buffers.len() <= slot {
            self.uniform_buffers.resize(slot + 1, None);
        }
        if let Some(buffer) = &self.uniform_buffers[slot]
            && buffer.size() >= size
        {
            return buffer.clone();
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Effect Uniforms {slot}")),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.uniform_buffers[slot] = Some(buffer.clone());
        buffer
    }

    fn ensure_variant(
        &mut self,
        handle: PipelineHandle,
        format: wgpu::TextureFormat,
    ) -> Result<()> {
        let pipeline = self
            .pipelines
            .get_mut(handle)
            .ok_or(EffectError::UnknownHandle("pipeline"))?;
        if pipeline.variants.contains_key(&format) {
            return Ok(());
        }

        log::debug!(
            "Creating effect render pipeline '{}' for {format:?}",
            pipeline.label
        );

        let render_pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&pipeline.label),
                layout: Some(&pipeline.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &pipeline.vertex_module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &pipeline.fragment_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        pipeline.variants.insert(format, render_pipeline);
        Ok(())
    }

    fn bind_group_layout(&self, label: &str, reflection: &ShaderReflection) -> wgpu::BindGroupLayout {
        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let mut entries = Vec::new();

        if let Some(block) = &reflection.uniform_block {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(u64::from(block.size)),
                },
                count: None,
            });
        }

        for slot in reflection.textures.values() {
            let (sample_type, sampler_type) = if slot.depth {
                (
                    wgpu::TextureSampleType::Depth,
                    wgpu::SamplerBindingType::NonFiltering,
                )
            } else {
                (
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::SamplerBindingType::Filtering,
                )
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            if let Some(binding) = slot.sampler_binding {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Sampler(sampler_type),
                    count: None,
                });
            }
        }
        entries.sort_by_key(|e| e.binding);

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            })
    }

    /// Resolves what each declared texture slot of `pipeline` receives.
    ///
    /// Slots the draw does not provide, or provides with the wrong kind of
    /// texture (color vs depth), get the matching placeholder.
    fn resolve_textures(
        &self,
        pipeline: &GpuPipeline,
        draw: &QuadDraw<'_>,
    ) -> Vec<(u32, Option<u32>, TextureHandle, SamplerDesc)> {
        let mut resolved = Vec::with_capacity(pipeline.reflection.textures.len());
        for (name, slot) in &pipeline.reflection.textures {
            let provided = draw.textures.iter().find(|b| b.binding == slot.binding);
            let placeholder = if slot.depth {
                self.depth_placeholder
            } else {
                self.placeholder
            };

            let (texture, sampler) = match provided {
                Some(b) => match self.textures.get(b.texture) {
                    Some(t) if t.is_depth() == slot.depth => (b.texture, b.sampler),
                    Some(t) => {
                        log::warn!(
                            "Texture '{}' ({:?}) does not match slot '{name}'; using placeholder",
                            t.label,
                            t.format
                        );
                        (placeholder, b.sampler)
                    }
                    None => (placeholder, b.sampler),
                },
                None => (placeholder, SamplerDesc::default()),
            };
            let sampler = if slot.depth {
                SamplerDesc::NEAREST_CLAMP
            } else {
                sampler
            };
            resolved.push((slot.binding, slot.sampler_binding, texture, sampler));
        }
        resolved
    }
}

impl GraphicsDevice for WgpuDevice {
    fn capabilities(&self) -> BackendCaps {
        BackendCaps {
            y_up_in_framebuffer: false,
            y_up_in_ndc: true,
            clip_depth_zero_to_one: true,
        }
    }

    // ─── Textures ─────────────────────────────────────────────────────

    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<TextureHandle> {
        if size.x == 0 || size.y == 0 {
            return Err(EffectError::TextureCreation(format!(
                "'{label}' has zero size {size}"
            )));
        }
        Ok(self.textures.insert(GpuTexture::new(
            &self.device,
            label,
            size,
            format,
            RENDER_TARGET_USAGE,
            1,
        )))
    }

    fn create_texture_with_data(&mut self, upload: &TextureUpload<'_>) -> Result<TextureHandle> {
        let Some(block_size) = upload.format.block_copy_size(None) else {
            return Err(EffectError::TextureCreation(format!(
                "'{}' uses a format without a copy size",
                upload.label
            )));
        };
        if upload.mip_levels.is_empty() || upload.size.min_element() == 0 {
            return Err(EffectError::TextureCreation(format!(
                "'{}' has no pixel data",
                upload.label
            )));
        }

        let gpu = GpuTexture::new(
            &self.device,
            upload.label,
            upload.size,
            upload.format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            upload.mip_levels.len() as u32,
        );

        for (level, data) in upload.mip_levels.iter().enumerate() {
            let width = (upload.size.x >> level).max(1);
            let height = (upload.size.y >> level).max(1);
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &gpu.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * block_size),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        Ok(self.textures.insert(gpu))
    }

    fn resize_texture(
        &mut self,
        texture: TextureHandle,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<()> {
        if size.x == 0 || size.y == 0 {
            return Err(EffectError::TextureCreation(format!(
                "cannot resize to zero size {size}"
            )));
        }
        let entry = self
            .textures
            .get_mut(texture)
            .ok_or(EffectError::UnknownHandle("texture"))?;
        let label = std::mem::take(&mut entry.label);
        // Dropped, not destroyed: commands recorded this frame may still
        // read the old texture until the encoder is submitted.
        *entry = GpuTexture::new(&self.device, &label, size, format, RENDER_TARGET_USAGE, 1);
        Ok(())
    }

    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(texture).map(|t| TextureInfo {
            size: t.size,
            format: t.format,
        })
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if texture == self.placeholder || texture == self.depth_placeholder {
            return;
        }
        // The handle goes away now; wgpu frees the texture once no pending
        // submission references it.
        self.textures.remove(texture);
    }

    fn placeholder_texture(&mut self) -> TextureHandle {
        self.placeholder
    }

    // ─── Render Targets ───────────────────────────────────────────────

    fn create_render_target(&mut self, texture: TextureHandle) -> Result<RenderTargetHandle> {
        if !self.textures.contains_key(texture) {
            return Err(EffectError::UnknownHandle("texture"));
        }
        Ok(self.render_targets.insert(texture))
    }

    fn rebuild_render_target(&mut self, target: RenderTargetHandle) -> Result<()> {
        // Targets render into their texture's current view, so a resize is
        // picked up automatically.
        let texture = self
            .render_targets
            .get(target)
            .ok_or(EffectError::UnknownHandle("render target"))?;
        if self.textures.contains_key(*texture) {
            Ok(())
        } else {
            Err(EffectError::UnknownHandle("texture"))
        }
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        self.render_targets.remove(target);
    }

    fn clear_render_target(&mut self, target: RenderTargetHandle, color: [f32; 4]) {
        let Some(view) = self
            .render_targets
            .get(target)
            .and_then(|t| self.textures.get(*t))
            .map(|t| &t.view)
        else {
            log::warn!("Clear requested for an unknown render target");
            return;
        };

        let encoder = Self::encoder(&self.device, &mut self.encoder);
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Effect Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(color[0]),
                        g: f64::from(color[1]),
                        b: f64::from(color[2]),
                        a: f64::from(color[3]),
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
    }

    // ─── Pipelines ────────────────────────────────────────────────────

    fn compile_pipeline(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<CompiledShader> {
        // Validate with naga first so bad sources surface as errors rather
        // than device-lost panics.
        let reflection = reflect::reflect_stages(label, vertex_source, fragment_source)?;

        log::debug!("Compiling effect pipeline '{label}'");

        let vertex_module = self.module(&format!("{label} (vertex)"), vertex_source);
        let fragment_module = self.module(&format!("{label} (fragment)"), fragment_source);
        let bind_group_layout = self.bind_group_layout(label, &reflection);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[Some(&bind_group_layout)],
                immediate_size: 0,
            });

        let handle = self.pipelines.insert(GpuPipeline {
            label: label.to_string(),
            vertex_module,
            fragment_module,
            bind_group_layout,
            pipeline_layout,
            reflection: reflection.clone(),
            variants: FxHashMap::default(),
        });

        Ok(CompiledShader { handle, reflection })
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(pipeline);
    }

    // ─── Commands ─────────────────────────────────────────────────────

    fn draw_fullscreen_quad(&mut self, draw: &QuadDraw<'_>) -> Result<()> {
        let target_texture = *self
            .render_targets
            .get(draw.target)
            .ok_or(EffectError::UnknownHandle("render target"))?;
        let target_format = self
            .textures
            .get(target_texture)
            .ok_or(EffectError::UnknownHandle("texture"))?
            .format;

        self.ensure_variant(draw.pipeline, target_format)?;

        let pipeline = self
            .pipelines
            .get(draw.pipeline)
            .ok_or(EffectError::UnknownHandle("pipeline"))?;
        let uniform_binding = pipeline.reflection.uniform_block.as_ref().map(|b| b.binding);
        let textures = self.resolve_textures(pipeline, draw);

        let uniform = match uniform_binding {
            Some(binding) => {
                let buffer = self.uniform_buffer(draw.uniform_slot, draw.uniform_data.len() as u64);
                self.queue.write_buffer(&buffer, 0, draw.uniform_data);
                Some((binding, buffer))
            }
            None => None,
        };
        for (.., sampler) in &textures {
            self.ensure_sampler(*sampler);
        }

        let Self {
            device,
            encoder,
            textures: gpu_textures,
            pipelines,
            samplers,
            ..
        } = self;

        let pipeline = pipelines
            .get(draw.pipeline)
            .ok_or(EffectError::UnknownHandle("pipeline"))?;
        let render_pipeline = pipeline
            .variants
            .get(&target_format)
            .ok_or(EffectError::UnknownHandle("pipeline variant"))?;

        let mut entries = Vec::with_capacity(textures.len() * 2 + 1);
        if let Some((binding, buffer)) = &uniform {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            });
        }
        for (binding, sampler_binding, texture, sampler) in &textures {
            let view = &gpu_textures
                .get(*texture)
                .ok_or(EffectError::UnknownHandle("texture"))?
                .view;
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            if let (Some(binding), Some(sampler)) = (sampler_binding, samplers.get(sampler)) {
                entries.push(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(draw.label),
            layout: &pipeline.bind_group_layout,
            entries: &entries,
        });

        let target_view = &gpu_textures
            .get(target_texture)
            .ok_or(EffectError::UnknownHandle("texture"))?
            .view;

        let encoder = Self::encoder(device, encoder);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        pass.set_viewport(
            0.0,
            0.0,
            draw.viewport.x as f32,
            draw.viewport.y as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(render_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }

    fn push_debug_group(&mut self, label: &str) {
        Self::encoder(&self.device, &mut self.encoder).push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        if let Some(encoder) = &mut self.encoder {
            encoder.pop_debug_group();
        }
    }
}
