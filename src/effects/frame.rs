//! Per-invocation state shared by every pass of one `process()` call.

use glam::{UVec2, Vec2};

use crate::device::TextureHandle;

#[derive(Debug, Clone)]
pub struct FrameContext {
    /// Size of every effect output.
    pub output_size: UVec2,
    pub depth_texture: Option<TextureHandle>,
    /// Camera (near, far).
    pub camera_clip_range: Vec2,
    /// Monotonic count of processed frames, starting at 1.
    pub frame_num: u64,
    pub fps: f32,
    /// Uniform buffer slot of the next draw. Also names effect outputs.
    pub uniform_slot: usize,
}

impl FrameContext {
    /// Size of a buffer scaled from the output size, at least 1x1.
    #[must_use]
    pub fn scaled_size(&self, multiplier: f32) -> UVec2 {
        (self.output_size.as_vec2() * multiplier)
            .floor()
            .as_uvec2()
            .max(UVec2::ONE)
    }

    /// Name of the output buffer for the current uniform slot.
    #[must_use]
    pub fn output_name(&self) -> String {
        format!("__output_{}", self.uniform_slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(output_size: UVec2) -> FrameContext {
        FrameContext {
            output_size,
            depth_texture: None,
            camera_clip_range: Vec2::new(0.1, 100.0),
            frame_num: 1,
            fps: 0.0,
            uniform_slot: 3,
        }
    }

    #[test]
    fn test_scaled_size_never_zero() {
        let frame = frame(UVec2::new(256, 3));
        assert_eq!(frame.scaled_size(0.25), UVec2::new(64, 1));
        assert_eq!(frame.scaled_size(0.0), UVec2::ONE);
        assert_eq!(frame.scaled_size(2.0), UVec2::new(512, 6));
    }

    #[test]
    fn test_output_name_uses_slot() {
        assert_eq!(frame(UVec2::ONE).output_name(), "__output_3");
    }
}
