//! Render Pass Executor
//!
//! Issues the device work for one `Render` command:
//!
//! 1. Clear pending render targets, except the pass's own output
//! 2. Bind the pass input as `input_texture`
//! 3. Push the common uniforms
//! 4. Bind every registered texture the shader declares
//! 5. Draw a full-screen quad into the output and advance the uniform slot
//!
//! # Common uniforms
//!
//! | Name | Type | Value |
//! |------|------|-------|
//! | `model_view_projection` | mat4 | identity; `[1][1] = -1` when framebuffer and NDC Y disagree |
//! | `input_size` | vec2 | pass input size |
//! | `output_size` | vec2 | pass output size |
//! | `frame_num` | f32 | processed frame count |
//! | `fps` | f32 | measured frame rate |
//! | `camera_properties` | vec2 | camera (near, far) |
//! | `normal_adjust_viewport_factor` | f32 | `1` for a Y-up framebuffer, else `-1` |
//! | `near_clip_value` | f32 | `0` for `[0, 1]` clip depth, else `-1` |
//!
//! Shaders only need to declare the ones they use.

use glam::{Mat4, Vec2};
use smallvec::SmallVec;

use super::interpreter::{EffectRun, Interpreter};
use crate::device::{BackendCaps, QuadDraw, TextureBinding};
use crate::effect::{ShaderDataType, UniformValue};

pub const INPUT_TEXTURE: &str = "input_texture";
pub const MODEL_VIEW_PROJECTION: &str = "model_view_projection";
pub const INPUT_SIZE: &str = "input_size";
pub const OUTPUT_SIZE: &str = "output_size";
pub const FRAME_NUM: &str = "frame_num";
pub const FPS: &str = "fps";
pub const CAMERA_PROPERTIES: &str = "camera_properties";
pub const NORMAL_ADJUST_VIEWPORT_FACTOR: &str = "normal_adjust_viewport_factor";
pub const NEAR_CLIP_VALUE: &str = "near_clip_value";

const DEBUG_GROUP: &str = "Post-processing effect";

/// Values of the common uniforms for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonUniforms {
    pub model_view_projection: Mat4,
    pub input_size: Vec2,
    pub output_size: Vec2,
    pub frame_num: f32,
    pub fps: f32,
    pub camera_properties: Vec2,
    pub normal_adjust_viewport_factor: f32,
    pub near_clip_value: f32,
}

impl CommonUniforms {
    #[must_use]
    pub fn new(caps: BackendCaps, input_size: Vec2, output_size: Vec2) -> Self {
        let mut model_view_projection = Mat4::IDENTITY;
        if caps.y_up_in_framebuffer != caps.y_up_in_ndc {
            model_view_projection.y_axis.y = -1.0;
        }
        Self {
            model_view_projection,
            input_size,
            output_size,
            frame_num: 0.0,
            fps: 0.0,
            camera_properties: Vec2::ZERO,
            normal_adjust_viewport_factor: if caps.y_up_in_framebuffer { 1.0 } else { -1.0 },
            near_clip_value: if caps.clip_depth_zero_to_one { 0.0 } else { -1.0 },
        }
    }

    /// `(name, value, type)` for each uniform.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, UniformValue, ShaderDataType); 8] {
        [
            (
                MODEL_VIEW_PROJECTION,
                UniformValue::Mat4(self.model_view_projection),
                ShaderDataType::Mat4,
            ),
            (INPUT_SIZE, UniformValue::Vec2(self.input_size), ShaderDataType::Vec2),
            (OUTPUT_SIZE, UniformValue::Vec2(self.output_size), ShaderDataType::Vec2),
            (FRAME_NUM, UniformValue::Float(self.frame_num), ShaderDataType::Float),
            (FPS, UniformValue::Float(self.fps), ShaderDataType::Float),
            (
                CAMERA_PROPERTIES,
                UniformValue::Vec2(self.camera_properties),
                ShaderDataType::Vec2,
            ),
            (
                NORMAL_ADJUST_VIEWPORT_FACTOR,
                UniformValue::Float(self.normal_adjust_viewport_factor),
                ShaderDataType::Float,
            ),
            (
                NEAR_CLIP_VALUE,
                UniformValue::Float(self.near_clip_value),
                ShaderDataType::Float,
            ),
        ]
    }
}

impl Interpreter<'_, '_> {
    pub(super) fn render(&mut self, run: &mut EffectRun<'_>) {
        let Some(key) = run.pass.active().cloned() else {
            log::debug!(
                "Render in effect '{}' skipped: no active pipeline",
                run.effect.class_name
            );
            return;
        };
        let Some(target_id) = run.current_output else {
            log::warn!("No effect render target in '{}'", run.effect.class_name);
            return;
        };

        let input = run.current_input;
        let input_texture = self.texture_of(input);
        let input_sampler = self.sampler_of(input);
        run.pass
            .bind_texture(INPUT_TEXTURE, Some(input_texture), input_sampler);

        let target = self.textures.buffer(target_id);
        let (render_target, output_size) = (target.render_target, target.size);
        let input_size = self.info_of(input).map_or(Vec2::ZERO, |info| info.size.as_vec2());

        let debug_markers = self.settings.debug_markers;
        let device = &mut *self.services.device;
        if debug_markers {
            device.push_debug_group(DEBUG_GROUP);
        }

        for pending in self.textures.take_pending_clears(render_target) {
            device.clear_render_target(pending, self.settings.clear_color);
        }

        let placeholder = device.placeholder_texture();
        let caps = device.capabilities();

        let Some(pipeline) = self.pipelines.get_mut(&key) else {
            if debug_markers {
                device.pop_debug_group();
            }
            return;
        };

        let uniforms = CommonUniforms {
            frame_num: self.frame.frame_num as f32,
            fps: self.frame.fps,
            camera_properties: self.frame.camera_clip_range,
            ..CommonUniforms::new(caps, input_size, output_size.as_vec2())
        };
        for (name, value, ty) in uniforms.entries() {
            pipeline.set_uniform(name, &value, ty);
        }

        let mut bindings: SmallVec<[TextureBinding; 8]> = SmallVec::new();
        for (name, bound) in run.pass.textures() {
            let Some(slot) = pipeline.binding_for_texture(name) else {
                continue;
            };
            log::trace!("Texture binding {} for {name}", slot.binding);
            bindings.push(TextureBinding {
                binding: slot.binding,
                sampler_binding: slot.sampler_binding,
                texture: bound.texture.unwrap_or(placeholder),
                sampler: bound.sampler,
            });
        }
        bindings.sort_by_key(|b| b.binding);

        let draw = QuadDraw {
            label: &run.effect.class_name,
            pipeline: pipeline.handle(),
            target: render_target,
            viewport: output_size,
            uniform_slot: self.frame.uniform_slot,
            uniform_data: pipeline.uniform_data(),
            textures: &bindings,
        };
        if let Err(err) = device.draw_fullscreen_quad(&draw) {
            log::error!("Effect '{}' draw failed: {err}", run.effect.class_name);
        }
        self.frame.uniform_slot += 1;

        if debug_markers {
            device.pop_debug_group();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgpu_orientation() {
        let caps = BackendCaps {
            y_up_in_framebuffer: false,
            y_up_in_ndc: true,
            clip_depth_zero_to_one: true,
        };
        let uniforms = CommonUniforms::new(caps, Vec2::splat(64.0), Vec2::splat(32.0));
        assert_eq!(uniforms.model_view_projection.y_axis.y, -1.0);
        assert_eq!(uniforms.model_view_projection.to_cols_array()[5], -1.0);
        assert_eq!(uniforms.normal_adjust_viewport_factor, -1.0);
        assert_eq!(uniforms.near_clip_value, 0.0);
    }

    #[test]
    fn test_matching_orientation_keeps_identity() {
        let caps = BackendCaps {
            y_up_in_framebuffer: true,
            y_up_in_ndc: true,
            clip_depth_zero_to_one: false,
        };
        let uniforms = CommonUniforms::new(caps, Vec2::ONE, Vec2::ONE);
        assert_eq!(uniforms.model_view_projection, Mat4::IDENTITY);
        assert_eq!(uniforms.normal_adjust_viewport_factor, 1.0);
        assert_eq!(uniforms.near_clip_value, -1.0);
    }
}
