//! Effect Chain Execution
//!
//! [`EffectSystem`] applies an [`EffectChain`] to a rendered scene image,
//! once per frame, and returns the final image.
//!
//! # Data Flow
//!
//! ```text
//! scene color ──► Effect 0 ──► __output_0 ──► Effect 1 ──► __output_1 ──► ...
//!                   │                           │
//!                   └── named buffers ──────────┘  (EffectTextureCache)
//! ```
//!
//! Each effect is interpreted by the command interpreter against:
//!
//! - [`EffectTextureCache`]: named intermediate buffers with transient or
//!   scene lifetime
//! - [`ShaderPipelineCache`]: compiled pipelines keyed by shader, effect
//!   instance and pass
//! - a [`PassContext`]: the texture bindings of the effect being run
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut effects = EffectSystem::new();
//!
//! // every frame
//! effects.setup(&mut device, output_size, Some(chain.clone()));
//! let mut services = EffectServices {
//!     device: &mut device,
//!     shaders: &library,
//!     images: &mut images,
//! };
//! let output = effects.process(&mut services, scene_color, Some(scene_depth), clip_range);
//! device.submit();
//!
//! // on shutdown
//! effects.release_resources(&mut device);
//! images.release(&mut device);
//! ```

pub mod binder;
pub mod frame;
pub mod pipeline_cache;
pub mod render_pass;
pub mod texture_cache;

pub(crate) mod interpreter;

use std::sync::Arc;

use glam::{UVec2, Vec2};

pub use binder::{BoundTexture, PassContext};
pub use frame::FrameContext;
pub use pipeline_cache::{PipelineKey, ShaderPipeline, ShaderPipelineCache};
pub use render_pass::CommonUniforms;
pub use texture_cache::{BufferId, EffectBuffer, EffectTextureCache};

use crate::device::{GraphicsDevice, TextureHandle};
use crate::effect::EffectChain;
use crate::image_manager::ImageManager;
use crate::settings::EffectSettings;
use crate::shader_library::ShaderSourceProvider;
use crate::utils::FpsCounter;
use interpreter::{BufferRef, Interpreter};

/// The collaborators one `process()` call works through.
pub struct EffectServices<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub shaders: &'a dyn ShaderSourceProvider,
    pub images: &'a mut dyn ImageManager,
}

/// Per-viewport effect chain executor.
///
/// Persists across frames so buffers and pipelines are reused. Call
/// [`release_resources`](Self::release_resources) before dropping it.
pub struct EffectSystem {
    settings: EffectSettings,
    chain: Option<Arc<EffectChain>>,
    output_size: UVec2,

    textures: EffectTextureCache,
    pipelines: ShaderPipelineCache,

    frame_count: u64,
    fps: FpsCounter,
}

impl Default for EffectSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(EffectSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: EffectSettings) -> Self {
        Self {
            settings,
            chain: None,
            output_size: UVec2::ZERO,
            textures: EffectTextureCache::new(),
            pipelines: ShaderPipelineCache::new(),
            frame_count: 0,
            fps: FpsCounter::new(),
        }
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Records the chain and output size for the next [`process`](Self::process).
    ///
    /// An absent or empty chain, or a zero output size, releases all
    /// resources and turns `process` into a pass-through.
    pub fn setup(
        &mut self,
        device: &mut dyn GraphicsDevice,
        output_size: UVec2,
        chain: Option<Arc<EffectChain>>,
    ) {
        let chain = chain.filter(|chain| !chain.is_empty());
        let Some(chain) = chain.filter(|_| output_size.min_element() > 0) else {
            if self.chain.is_some() {
                log::debug!("Effect chain cleared; releasing resources");
            }
            self.chain = None;
            self.release_resources(device);
            return;
        };

        let replaced = self
            .chain
            .as_ref()
            .is_some_and(|previous| !Arc::ptr_eq(previous, &chain));
        if replaced {
            let live: Vec<_> = chain.iter().map(crate::effect::Effect::id).collect();
            self.pipelines.retain_effects(device, &live);
        }

        self.chain = Some(chain);
        self.output_size = output_size;
    }

    /// Runs the configured chain over `input` and returns the final texture.
    ///
    /// Returns `input` itself when no chain is configured. The returned
    /// texture stays valid until the next call.
    pub fn process(
        &mut self,
        services: &mut EffectServices<'_>,
        input: TextureHandle,
        depth: Option<TextureHandle>,
        camera_clip_range: Vec2,
    ) -> TextureHandle {
        let Some(chain) = self.chain.clone() else {
            return input;
        };

        self.frame_count += 1;
        self.fps.tick();

        let mut frame = FrameContext {
            output_size: self.output_size,
            depth_texture: depth,
            camera_clip_range,
            frame_num: self.frame_count,
            fps: self.fps.fps(),
            uniform_slot: 0,
        };

        let mut interpreter = Interpreter {
            services,
            textures: &mut self.textures,
            pipelines: &mut self.pipelines,
            frame: &mut frame,
            settings: &self.settings,
        };

        let mut latest = BufferRef::Scene(input);
        for effect in chain.iter() {
            match interpreter.run_effect(effect, latest) {
                Some(output) => {
                    if let BufferRef::Cached(previous) = latest
                        && previous != output
                    {
                        interpreter.textures.release(previous);
                    }
                    latest = BufferRef::Cached(output);
                }
                None => log::warn!(
                    "Effect '{}' produced no output; passing its input through",
                    effect.class_name
                ),
            }
        }
        interpreter.textures.release_all();

        interpreter.texture_of(latest)
    }

    /// Destroys every cached buffer and pipeline. Safe to call repeatedly.
    pub fn release_resources(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.textures.is_empty() || !self.pipelines.is_empty() {
            log::debug!(
                "Releasing {} effect buffers and {} pipelines",
                self.textures.len(),
                self.pipelines.len()
            );
        }
        self.textures.teardown(device);
        self.pipelines.clear(device);
    }

    // ─── Introspection ────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn find_buffer(&self, name: &str) -> Option<&EffectBuffer> {
        self.textures.find(name).map(|id| self.textures.buffer(id))
    }

    pub fn buffers(&self) -> impl Iterator<Item = &EffectBuffer> {
        self.textures.iter().map(|(_, buffer)| buffer)
    }

    /// Number of `process()` calls that ran a chain.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    #[must_use]
    pub fn output_size(&self) -> UVec2 {
        self.output_size
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.chain.is_some()
    }
}

impl Drop for EffectSystem {
    fn drop(&mut self) {
        if !self.textures.is_empty() || !self.pipelines.is_empty() {
            log::warn!(
                "EffectSystem dropped with {} buffers and {} pipelines still allocated",
                self.textures.len(),
                self.pipelines.len()
            );
        }
    }
}
