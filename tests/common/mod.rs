//! Shared test fixtures: a recording [`GraphicsDevice`] and image managers.
//!
//! `RecordingDevice` does no GPU work. Each texture carries a content tag;
//! a draw writes `key(<input contents>)` into its target, where `key` is the
//! shader key of the pipeline and the inputs are the tags of every bound
//! texture in binding order. Declared slots the draw leaves unbound read
//! the placeholder, as on the real device. Shader sources still go through naga
//! reflection, so the built-in WGSL is validated by these tests.

#![allow(dead_code)]

use std::sync::Arc;

use glam::{UVec2, Vec2};
use slotmap::SlotMap;

use myth_effects::device::reflect::reflect_stages;
use myth_effects::device::{
    BackendCaps, CompiledShader, GraphicsDevice, PipelineHandle, RenderTargetHandle,
    TextureHandle, TextureInfo, TextureUpload,
};
use myth_effects::effect::ImageSource;
use myth_effects::errors::{EffectError, Result};
use myth_effects::image_manager::{ImageManager, MipMode};
use myth_effects::{EffectChain, EffectServices, EffectSystem, ShaderLibrary};

pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct FakeTexture {
    pub label: String,
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    pub content: String,
}

pub struct FakePipeline {
    pub shader_key: String,
    pub reflection: myth_effects::device::ShaderReflection,
}

/// One recorded `draw_fullscreen_quad`.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub shader_key: String,
    pub target_texture: TextureHandle,
    pub viewport: UVec2,
    pub uniform_slot: usize,
    pub uniform_data: Vec<u8>,
    /// `(binding, texture)` for every declared texture slot, in binding order.
    pub textures: Vec<(u32, TextureHandle)>,
    /// Declared slots the draw left unbound; the device filled them with the placeholder.
    pub placeholder_bindings: Vec<u32>,
}

impl DrawRecord {
    pub fn uniform_f32(&self, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&self.uniform_data[offset..offset + 4])
    }

    pub fn uniform_vec2(&self, offset: usize) -> Vec2 {
        Vec2::new(self.uniform_f32(offset), self.uniform_f32(offset + 4))
    }
}

#[derive(Default)]
pub struct RecordingDevice {
    pub textures: SlotMap<TextureHandle, FakeTexture>,
    pub render_targets: SlotMap<RenderTargetHandle, TextureHandle>,
    pub pipelines: SlotMap<PipelineHandle, FakePipeline>,
    placeholder: Option<TextureHandle>,

    pub textures_created: usize,
    pub compiles: usize,
    pub clears: Vec<TextureHandle>,
    pub draws: Vec<DrawRecord>,
    pub debug_groups: Vec<String>,
    pub open_debug_groups: usize,
    /// Shader keys whose compilation fails.
    pub failing_shaders: Vec<String>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a caller-owned texture with a content tag, like a scene color buffer.
    pub fn scene_texture(&mut self, content: &str, size: UVec2) -> TextureHandle {
        self.textures.insert(FakeTexture {
            label: content.to_string(),
            size,
            format: SCENE_FORMAT,
            content: content.to_string(),
        })
    }

    pub fn content(&self, texture: TextureHandle) -> &str {
        &self.textures[texture].content
    }

    /// Textures alive on the device, not counting the placeholder.
    pub fn live_textures(&self) -> usize {
        self.textures.len() - usize::from(self.placeholder.is_some())
    }

    /// The shader key embedded in a pipeline label `Effect <key> #<pass>`.
    fn shader_key_of(label: &str) -> String {
        label
            .strip_prefix("Effect ")
            .and_then(|rest| rest.rsplit_once(" #"))
            .map_or(label, |(key, _)| key)
            .to_string()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn capabilities(&self) -> BackendCaps {
        BackendCaps {
            y_up_in_framebuffer: false,
            y_up_in_ndc: true,
            clip_depth_zero_to_one: true,
        }
    }

    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<TextureHandle> {
        if size.min_element() == 0 {
            return Err(EffectError::TextureCreation(format!("'{label}' has zero size")));
        }
        self.textures_created += 1;
        Ok(self.textures.insert(FakeTexture {
            label: label.to_string(),
            size,
            format,
            content: String::new(),
        }))
    }

    fn create_texture_with_data(&mut self, upload: &TextureUpload<'_>) -> Result<TextureHandle> {
        self.textures_created += 1;
        Ok(self.textures.insert(FakeTexture {
            label: upload.label.to_string(),
            size: upload.size,
            format: upload.format,
            content: upload.label.to_string(),
        }))
    }

    fn resize_texture(
        &mut self,
        texture: TextureHandle,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<()> {
        let tex = self
            .textures
            .get_mut(texture)
            .ok_or(EffectError::UnknownHandle("texture"))?;
        tex.size = size;
        tex.format = format;
        tex.content.clear();
        Ok(())
    }

    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(texture).map(|tex| TextureInfo {
            size: tex.size,
            format: tex.format,
        })
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture);
    }

    fn placeholder_texture(&mut self) -> TextureHandle {
        if let Some(placeholder) = self.placeholder {
            return placeholder;
        }
        let placeholder = self.textures.insert(FakeTexture {
            label: "placeholder".into(),
            size: UVec2::ONE,
            format: SCENE_FORMAT,
            content: "placeholder".into(),
        });
        self.placeholder = Some(placeholder);
        placeholder
    }

    fn create_render_target(&mut self, texture: TextureHandle) -> Result<RenderTargetHandle> {
        if !self.textures.contains_key(texture) {
            return Err(EffectError::UnknownHandle("texture"));
        }
        Ok(self.render_targets.insert(texture))
    }

    fn rebuild_render_target(&mut self, target: RenderTargetHandle) -> Result<()> {
        self.render_targets
            .get(target)
            .map(|_| ())
            .ok_or(EffectError::UnknownHandle("render target"))
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        self.render_targets.remove(target);
    }

    fn clear_render_target(&mut self, target: RenderTargetHandle, _color: [f32; 4]) {
        let texture = self.render_targets[target];
        self.textures[texture].content = "clear".into();
        self.clears.push(texture);
    }

    fn compile_pipeline(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<CompiledShader> {
        let shader_key = Self::shader_key_of(label);
        if self.failing_shaders.contains(&shader_key) {
            return Err(EffectError::ShaderCompile {
                label: label.to_string(),
                message: "rejected by test device".into(),
            });
        }
        let reflection = reflect_stages(label, vertex_source, fragment_source)?;
        self.compiles += 1;
        let handle = self.pipelines.insert(FakePipeline {
            shader_key,
            reflection: reflection.clone(),
        });
        Ok(CompiledShader { handle, reflection })
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(pipeline);
    }

    fn draw_fullscreen_quad(&mut self, draw: &myth_effects::device::QuadDraw<'_>) -> Result<()> {
        let pipeline = self
            .pipelines
            .get(draw.pipeline)
            .ok_or(EffectError::UnknownHandle("pipeline"))?;
        let target_texture = *self
            .render_targets
            .get(draw.target)
            .ok_or(EffectError::UnknownHandle("render target"))?;

        let mut slots: Vec<u32> = pipeline
            .reflection
            .textures
            .values()
            .map(|slot| slot.binding)
            .collect();
        slots.sort_unstable();
        let shader_key = pipeline.shader_key.clone();

        let mut textures = Vec::with_capacity(slots.len());
        let mut placeholder_bindings = Vec::new();
        for binding in slots {
            let provided = draw
                .textures
                .iter()
                .find(|b| b.binding == binding && self.textures.contains_key(b.texture));
            let texture = match provided {
                Some(b) => b.texture,
                None => {
                    placeholder_bindings.push(binding);
                    self.placeholder_texture()
                }
            };
            textures.push((binding, texture));
        }

        let inputs: Vec<&str> = textures
            .iter()
            .map(|(_, texture)| self.textures[*texture].content.as_str())
            .collect();
        let content = format!("{shader_key}({})", inputs.join(","));

        self.draws.push(DrawRecord {
            shader_key,
            target_texture,
            viewport: draw.viewport,
            uniform_slot: draw.uniform_slot,
            uniform_data: draw.uniform_data.to_vec(),
            textures,
            placeholder_bindings,
        });
        self.textures[target_texture].content = content;
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label.to_string());
        self.open_debug_groups += 1;
    }

    fn pop_debug_group(&mut self) {
        self.open_debug_groups -= 1;
    }
}

// ─── Image Managers ───────────────────────────────────────────────────

/// Fails every load.
#[derive(Default)]
pub struct NoImages {
    pub requests: usize,
}

impl ImageManager for NoImages {
    fn load_image(
        &mut self,
        _device: &mut dyn GraphicsDevice,
        _source: &ImageSource,
        _mip_mode: MipMode,
    ) -> Option<TextureHandle> {
        self.requests += 1;
        None
    }
}

/// Uploads a tagged texture per source key and caches it.
#[derive(Default)]
pub struct TaggedImages {
    pub loaded: Vec<(String, MipMode, TextureHandle)>,
}

impl ImageManager for TaggedImages {
    fn load_image(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &ImageSource,
        mip_mode: MipMode,
    ) -> Option<TextureHandle> {
        let key = source.cache_key();
        if let Some((_, _, handle)) = self
            .loaded
            .iter()
            .find(|(k, mode, _)| *k == key && *mode == mip_mode)
        {
            return Some(*handle);
        }
        let handle = device
            .create_texture_with_data(&TextureUpload {
                label: &key,
                size: UVec2::ONE,
                format: SCENE_FORMAT,
                mip_levels: &[vec![0; 4]],
            })
            .ok()?;
        self.loaded.push((key, mip_mode, handle));
        Some(handle)
    }
}

// ─── Harness ──────────────────────────────────────────────────────────

/// Shaders used by the tests in addition to the built-ins.
pub fn test_library() -> ShaderLibrary {
    let mut library = ShaderLibrary::new();
    library
        .register_fragment("blurV", BLUR_INPUT_FRAGMENT)
        .expect("shared vertex stage is embedded");
    library
        .register_fragment("blurH", BLUR_INPUT_FRAGMENT)
        .expect("shared vertex stage is embedded");
    library
        .register_fragment("noise_overlay", NOISE_FRAGMENT)
        .expect("shared vertex stage is embedded");
    library
}

/// Reads `blur_input` when bound, `input_texture` otherwise.
pub const BLUR_INPUT_FRAGMENT: &str = "
@group(0) @binding(1) var input_texture: texture_2d<f32>;
@group(0) @binding(2) var input_texture_sampler: sampler;
@group(0) @binding(3) var blur_input: texture_2d<f32>;
@group(0) @binding(4) var blur_input_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(input_texture, input_texture_sampler, uv)
        + textureSample(blur_input, blur_input_sampler, uv);
}
";

/// Blends the input with a `noise` texture property scaled by `strength`.
pub const NOISE_FRAGMENT: &str = "
struct EffectUniforms {
    model_view_projection: mat4x4<f32>,
    input_size: vec2<f32>,
    output_size: vec2<f32>,
    camera_properties: vec2<f32>,
    frame_num: f32,
    fps: f32,
    normal_adjust_viewport_factor: f32,
    near_clip_value: f32,
    strength: f32,
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> effect: EffectUniforms;
@group(0) @binding(1) var input_texture: texture_2d<f32>;
@group(0) @binding(2) var input_texture_sampler: sampler;
@group(0) @binding(3) var noise: texture_2d<f32>;
@group(0) @binding(4) var noise_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let base = textureSample(input_texture, input_texture_sampler, uv);
    let grain = textureSample(noise, noise_sampler, uv);
    return mix(base, grain * effect.tint, effect.strength);
}
";

/// Byte offsets inside the common uniform block.
pub mod offsets {
    pub const MVP_Y_AXIS_Y: usize = 20;
    pub const INPUT_SIZE: usize = 64;
    pub const OUTPUT_SIZE: usize = 72;
    pub const CAMERA_PROPERTIES: usize = 80;
    pub const FRAME_NUM: usize = 88;
    pub const FPS: usize = 92;
    pub const NORMAL_ADJUST_VIEWPORT_FACTOR: usize = 96;
    pub const NEAR_CLIP_VALUE: usize = 100;
    /// First member after the common block (`amount`, `strength`).
    pub const FIRST_EFFECT_MEMBER: usize = 104;
    /// `tint` in the noise shader (vec4, 16-aligned).
    pub const NOISE_TINT: usize = 112;
}

/// Bundles the device, shaders and images a test drives the system with.
pub struct Harness<I: ImageManager = NoImages> {
    pub device: RecordingDevice,
    pub library: ShaderLibrary,
    pub images: I,
    pub system: EffectSystem,
}

impl Harness<NoImages> {
    pub fn new() -> Self {
        Self::with_images(NoImages::default())
    }
}

impl<I: ImageManager> Harness<I> {
    pub fn with_images(images: I) -> Self {
        Self {
            device: RecordingDevice::new(),
            library: test_library(),
            images,
            system: EffectSystem::new(),
        }
    }

    pub fn setup(&mut self, size: UVec2, chain: Option<Arc<EffectChain>>) {
        self.system.setup(&mut self.device, size, chain);
    }

    pub fn process(&mut self, input: TextureHandle, depth: Option<TextureHandle>) -> TextureHandle {
        let mut services = EffectServices {
            device: &mut self.device,
            shaders: &self.library,
            images: &mut self.images,
        };
        self.system
            .process(&mut services, input, depth, Vec2::new(0.1, 100.0))
    }

    pub fn release(&mut self) {
        self.system.release_resources(&mut self.device);
    }
}
