//! Graphics Device Abstraction
//!
//! The effect system never talks to a graphics API directly. Everything it
//! needs from the GPU goes through [`GraphicsDevice`]: texture and render
//! target creation, pipeline compilation, clears and full-screen quad draws.
//!
//! # Handles
//!
//! Device objects are referenced by slotmap keys ([`TextureHandle`],
//! [`RenderTargetHandle`], [`PipelineHandle`]). A handle stays valid until the
//! object is destroyed; resizing a texture keeps its handle.
//!
//! # Backends
//!
//! - [`wgpu_device::WgpuDevice`]: the wgpu implementation
//!
//! Shader resources are discovered with [`reflect`], which any backend
//! accepting WGSL can reuse.

pub mod reflect;
pub mod wgpu_device;

use glam::UVec2;
use slotmap::new_key_type;

use crate::errors::Result;

pub use reflect::{ShaderReflection, TextureSlot, UniformBlockLayout, UniformMember};

new_key_type! {
    /// A device texture.
    pub struct TextureHandle;
    /// A render target writing into one texture.
    pub struct RenderTargetHandle;
    /// A compiled vertex + fragment pipeline.
    pub struct PipelineHandle;
}

/// Orientation and depth conventions of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCaps {
    pub y_up_in_framebuffer: bool,
    pub y_up_in_ndc: bool,
    pub clip_depth_zero_to_one: bool,
}

/// Sampler state used when binding a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: wgpu::FilterMode,
    pub mag_filter: wgpu::FilterMode,
    pub mipmap_filter: Option<wgpu::MipmapFilterMode>,
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
}

impl SamplerDesc {
    /// Linear filtering, clamp to edge, no mipmaps.
    pub const LINEAR_CLAMP: Self = Self {
        min_filter: wgpu::FilterMode::Linear,
        mag_filter: wgpu::FilterMode::Linear,
        mipmap_filter: None,
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
    };

    /// Nearest filtering, clamp to edge. Used for depth textures.
    pub const NEAREST_CLAMP: Self = Self {
        min_filter: wgpu::FilterMode::Nearest,
        mag_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: None,
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
    };

    /// Same filter on both axes and one wrap mode for both axes.
    #[must_use]
    pub fn new(filter: wgpu::FilterMode, wrap: wgpu::AddressMode) -> Self {
        Self {
            min_filter: filter,
            mag_filter: filter,
            mipmap_filter: None,
            address_mode_u: wrap,
            address_mode_v: wrap,
        }
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::LINEAR_CLAMP
    }
}

/// Size and format of a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
}

/// Pixel data for a texture created with contents.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub label: &'a str,
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    /// One tightly packed slice per mip level, largest first.
    pub mip_levels: &'a [Vec<u8>],
}

/// Result of a successful pipeline compilation.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub handle: PipelineHandle,
    pub reflection: ShaderReflection,
}

/// One texture + sampler pair bound for a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureBinding {
    pub binding: u32,
    pub sampler_binding: Option<u32>,
    pub texture: TextureHandle,
    pub sampler: SamplerDesc,
}

/// A full-screen quad draw into one render target.
#[derive(Debug, Clone, Copy)]
pub struct QuadDraw<'a> {
    pub label: &'a str,
    pub pipeline: PipelineHandle,
    pub target: RenderTargetHandle,
    pub viewport: UVec2,
    /// Index of the per-pass uniform buffer to upload into.
    pub uniform_slot: usize,
    pub uniform_data: &'a [u8],
    /// Sorted by binding slot.
    pub textures: &'a [TextureBinding],
}

/// The GPU operations the effect system relies on.
pub trait GraphicsDevice {
    fn capabilities(&self) -> BackendCaps;

    // ─── Textures ─────────────────────────────────────────────────────

    /// Creates a texture usable both as a render target and as a sampled texture.
    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<TextureHandle>;

    /// Creates a sampled texture with initial contents.
    fn create_texture_with_data(&mut self, upload: &TextureUpload<'_>) -> Result<TextureHandle>;

    /// Re-creates the storage of `texture` with a new size/format. The handle stays valid.
    fn resize_texture(
        &mut self,
        texture: TextureHandle,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<()>;

    fn texture_info(&self, texture: TextureHandle) -> Option<TextureInfo>;

    fn destroy_texture(&mut self, texture: TextureHandle);

    /// A 1x1 texture bound wherever a shader texture is missing.
    fn placeholder_texture(&mut self) -> TextureHandle;

    // ─── Render Targets ───────────────────────────────────────────────

    fn create_render_target(&mut self, texture: TextureHandle) -> Result<RenderTargetHandle>;

    /// Refreshes a render target after its texture was resized.
    fn rebuild_render_target(&mut self, target: RenderTargetHandle) -> Result<()>;

    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    /// Clears the whole target to `color` (RGBA).
    fn clear_render_target(&mut self, target: RenderTargetHandle, color: [f32; 4]);

    // ─── Pipelines ────────────────────────────────────────────────────

    /// Compiles a vertex + fragment pipeline and reflects its resources.
    fn compile_pipeline(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<CompiledShader>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // ─── Commands ─────────────────────────────────────────────────────

    fn draw_fullscreen_quad(&mut self, draw: &QuadDraw<'_>) -> Result<()>;

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);
}
