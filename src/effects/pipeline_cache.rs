//! Effect Shader Pipeline Cache
//!
//! Compiled pipelines are cached per [`PipelineKey`]: the shader key, the
//! effect instance and the pass index. Two effects using the same shader get
//! separate entries, so each keeps its own uniform values between frames.
//!
//! An entry is compiled once and reused until [`ShaderPipelineCache::clear`].
//! A failed compilation is not cached; the next bind retries it.

use rustc_hash::FxHashMap;

use crate::device::{BackendCaps, GraphicsDevice, PipelineHandle, ShaderReflection, TextureSlot};
use crate::effect::{EffectId, ShaderDataType, UniformValue};
use crate::errors::{EffectError, Result};
use crate::shader_library::{ShaderSourceProvider, ShaderStage};

/// Identity of a cached pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader_key: String,
    pub effect: EffectId,
    pub pass_index: u32,
}

/// Prepended to every vertex stage when the framebuffer is Y-up.
const UV_MAP_IDENTITY: &str = "\
fn effect_texture_map_uv(uv: vec2<f32>) -> vec2<f32> {
    return uv;
}
";

/// Prepended to every vertex stage when the framebuffer is Y-down.
const UV_MAP_FLIPPED: &str = "\
fn effect_texture_map_uv(uv: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(uv.x, 1.0 - uv.y);
}
";

/// The UV orientation helper for a backend.
#[must_use]
pub fn uv_map_helper(caps: BackendCaps) -> &'static str {
    if caps.y_up_in_framebuffer {
        UV_MAP_IDENTITY
    } else {
        UV_MAP_FLIPPED
    }
}

/// A compiled pipeline with its binding table and uniform values.
#[derive(Debug)]
pub struct ShaderPipeline {
    handle: PipelineHandle,
    reflection: ShaderReflection,
    /// Uniform block contents, laid out per the reflected member offsets.
    uniform_data: Vec<u8>,
}

impl ShaderPipeline {
    fn new(handle: PipelineHandle, reflection: ShaderReflection) -> Self {
        let size = reflection
            .uniform_block
            .as_ref()
            .map_or(0, |block| block.size as usize);
        Self {
            handle,
            reflection,
            uniform_data: vec![0; size],
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    #[must_use]
    pub fn binding_for_texture(&self, name: &str) -> Option<&TextureSlot> {
        self.reflection.texture(name)
    }

    #[inline]
    #[must_use]
    pub fn uniform_data(&self) -> &[u8] {
        &self.uniform_data
    }

    /// Stores `value` as `data_type` into the uniform member `name`.
    ///
    /// Uniforms the shader does not declare are ignored. Returns whether the
    /// value was written.
    pub fn set_uniform(&mut self, name: &str, value: &UniformValue, data_type: ShaderDataType) -> bool {
        let Some(member) = self.reflection.uniform_member(name).copied() else {
            return false;
        };
        let Some(value) = value
            .convert(data_type)
            .and_then(|typed| typed.convert(member.ty))
        else {
            log::warn!(
                "Uniform '{name}': {:?} cannot be stored as {data_type:?} (shader declares {:?})",
                value.data_type(),
                member.ty
            );
            return false;
        };

        let offset = member.offset as usize;
        let end = offset + member.ty.size();
        let Some(dst) = self.uniform_data.get_mut(offset..end) else {
            log::warn!("Uniform '{name}' lies outside its uniform block");
            return false;
        };
        value.write_bytes(dst);
        true
    }
}

#[derive(Debug, Default)]
pub struct ShaderPipelineCache {
    pipelines: FxHashMap<PipelineKey, ShaderPipeline>,
}

impl ShaderPipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &PipelineKey) -> Option<&ShaderPipeline> {
        self.pipelines.get(key)
    }

    pub fn get_mut(&mut self, key: &PipelineKey) -> Option<&mut ShaderPipeline> {
        self.pipelines.get_mut(key)
    }

    /// Returns the cached pipeline for `key`, compiling it on a miss.
    pub fn get_or_compile(
        &mut self,
        key: &PipelineKey,
        device: &mut dyn GraphicsDevice,
        shaders: &dyn ShaderSourceProvider,
    ) -> Result<&mut ShaderPipeline> {
        if !self.pipelines.contains_key(key) {
            let pipeline = Self::compile(key, device, shaders)?;
            self.pipelines.insert(key.clone(), pipeline);
        }
        self.pipelines
            .get_mut(key)
            .ok_or(EffectError::UnknownHandle("pipeline"))
    }

    fn compile(
        key: &PipelineKey,
        device: &mut dyn GraphicsDevice,
        shaders: &dyn ShaderSourceProvider,
    ) -> Result<ShaderPipeline> {
        log::debug!(
            "Generating effect pipeline for '{}' (effect {}, pass {})",
            key.shader_key,
            key.effect.raw(),
            key.pass_index
        );

        let vertex = shaders.shader_source(&key.shader_key, ShaderStage::Vertex)?;
        let fragment = shaders.shader_source(&key.shader_key, ShaderStage::Fragment)?;

        let mut vertex_source = String::with_capacity(vertex.len() + UV_MAP_FLIPPED.len() + 1);
        vertex_source.push_str(uv_map_helper(device.capabilities()));
        vertex_source.push('\n');
        vertex_source.push_str(&vertex);

        let label = format!("Effect {} #{}", key.shader_key, key.pass_index);
        let compiled = device.compile_pipeline(&label, &vertex_source, &fragment)?;
        Ok(ShaderPipeline::new(compiled.handle, compiled.reflection))
    }

    /// Destroys the pipelines of effects not in `live`.
    pub fn retain_effects(&mut self, device: &mut dyn GraphicsDevice, live: &[EffectId]) {
        self.pipelines.retain(|key, pipeline| {
            let keep = live.contains(&key.effect);
            if !keep {
                log::debug!(
                    "Dropping effect pipeline '{}' (effect {} left the chain)",
                    key.shader_key,
                    key.effect.raw()
                );
                device.destroy_pipeline(pipeline.handle);
            }
            keep
        });
    }

    /// Destroys every cached pipeline.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, pipeline) in self.pipelines.drain() {
            device.destroy_pipeline(pipeline.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{UniformBlockLayout, UniformMember};
    use glam::Vec2;

    fn pipeline_with_members(members: &[(&str, u32, ShaderDataType)], size: u32) -> ShaderPipeline {
        let reflection = ShaderReflection {
            textures: FxHashMap::default(),
            uniform_block: Some(UniformBlockLayout {
                binding: 0,
                size,
                members: members
                    .iter()
                    .map(|(name, offset, ty)| {
                        (
                            (*name).to_string(),
                            UniformMember {
                                offset: *offset,
                                ty: *ty,
                            },
                        )
                    })
                    .collect(),
            }),
        };
        ShaderPipeline::new(PipelineHandle::default(), reflection)
    }

    #[test]
    fn test_set_uniform_writes_at_offset() {
        let mut pipeline = pipeline_with_members(
            &[
                ("size", 0, ShaderDataType::Vec2),
                ("amount", 8, ShaderDataType::Float),
            ],
            16,
        );
        assert!(pipeline.set_uniform(
            "size",
            &UniformValue::Vec2(Vec2::new(256.0, 128.0)),
            ShaderDataType::Vec2
        ));
        assert!(pipeline.set_uniform("amount", &UniformValue::Int(3), ShaderDataType::Float));

        let floats: &[f32] = bytemuck::cast_slice(pipeline.uniform_data());
        assert_eq!(&floats[..3], &[256.0, 128.0, 3.0]);
    }

    #[test]
    fn test_undeclared_uniform_is_ignored() {
        let mut pipeline = pipeline_with_members(&[("amount", 0, ShaderDataType::Float)], 16);
        assert!(!pipeline.set_uniform("fps", &UniformValue::Float(60.0), ShaderDataType::Float));
        assert!(pipeline.uniform_data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_incompatible_shape_is_rejected() {
        let mut pipeline = pipeline_with_members(&[("amount", 0, ShaderDataType::Float)], 16);
        assert!(!pipeline.set_uniform(
            "amount",
            &UniformValue::Vec2(Vec2::ONE),
            ShaderDataType::Vec2
        ));
    }

    #[test]
    fn test_uv_helper_follows_framebuffer_orientation() {
        let mut caps = BackendCaps {
            y_up_in_framebuffer: false,
            y_up_in_ndc: true,
            clip_depth_zero_to_one: true,
        };
        assert!(uv_map_helper(caps).contains("1.0 - uv.y"));
        caps.y_up_in_framebuffer = true;
        assert!(uv_map_helper(caps).contains("return uv;"));
    }
}
