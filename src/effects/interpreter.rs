//! Command Interpreter
//!
//! Executes one effect's command list. Each effect starts with its input as
//! the pass input, no output and no active pipeline; the commands then
//! allocate buffers, bind shaders and values, and issue renders.
//!
//! Degraded paths (unknown buffer names, failed allocations, failed
//! compiles) log and skip the offending command, so a broken effect never
//! stops the chain.

use super::binder::PassContext;
use super::frame::FrameContext;
use super::pipeline_cache::{PipelineKey, ShaderPipelineCache};
use super::texture_cache::{BufferId, EffectTextureCache};
use super::EffectServices;
use crate::device::{SamplerDesc, TextureHandle, TextureInfo};
use crate::effect::{AllocateBuffer, ApplyBufferValue, BindShader, BindTarget, Command, Effect};
use crate::settings::EffectSettings;

/// Where a pass reads from.
///
/// The scene input is borrowed from the caller and kept distinct from cached
/// buffers, so the cache can never release or destroy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferRef {
    Scene(TextureHandle),
    Cached(BufferId),
}

/// State of one effect's execution.
pub(crate) struct EffectRun<'e> {
    pub(crate) effect: &'e Effect,
    /// The effect input; every `Render` resets `current_input` to it.
    pub(crate) input: BufferRef,
    pub(crate) current_input: BufferRef,
    pub(crate) current_output: Option<BufferId>,
    pub(crate) final_output: Option<BufferId>,
    pub(crate) pass: PassContext,
}

/// Everything the commands of one `process()` call operate on.
pub(crate) struct Interpreter<'a, 's> {
    pub(crate) services: &'a mut EffectServices<'s>,
    pub(crate) textures: &'a mut EffectTextureCache,
    pub(crate) pipelines: &'a mut ShaderPipelineCache,
    pub(crate) frame: &'a mut FrameContext,
    pub(crate) settings: &'a EffectSettings,
}

impl Interpreter<'_, '_> {
    /// Runs `effect` reading from `input`. Returns the buffer written by its
    /// last `BindTarget`, if any.
    pub(crate) fn run_effect(&mut self, effect: &Effect, input: BufferRef) -> Option<BufferId> {
        log::debug!("Begin effect '{}'", effect.class_name);

        let mut run = EffectRun {
            effect,
            input,
            current_input: input,
            current_output: None,
            final_output: None,
            pass: PassContext::new(),
        };

        for command in &effect.commands {
            if self.settings.trace_commands {
                log::trace!("> {command}");
            }

            match command {
                Command::AllocateBuffer(cmd) => self.allocate_buffer(&run, cmd),
                Command::ApplyBufferValue(cmd) => self.apply_buffer_value(&mut run, cmd),
                Command::ApplyDepthValue(cmd) => self.apply_depth_value(&mut run, cmd),
                Command::ApplyInstanceValue(cmd) => self.apply_instance_value(&mut run, cmd),
                Command::ApplyValue(cmd) => self.apply_value(&mut run, cmd),
                Command::BindBuffer(cmd) => {
                    run.current_output = self.textures.find(&cmd.name);
                    if run.current_output.is_none() {
                        log::warn!("BindBuffer: no buffer named '{}'", cmd.name);
                    }
                }
                Command::BindShader(cmd) => self.bind_shader(&mut run, cmd),
                Command::BindTarget(cmd) => self.bind_target(&mut run, cmd),
                Command::Render => {
                    self.render(&mut run);
                    run.current_input = run.input;
                }
            }
        }

        log::debug!("End effect '{}'", effect.class_name);
        run.final_output
    }

    // ─── Buffer Resolution ────────────────────────────────────────────

    pub(crate) fn texture_of(&self, buffer: BufferRef) -> TextureHandle {
        match buffer {
            BufferRef::Scene(texture) => texture,
            BufferRef::Cached(id) => self.textures.buffer(id).texture,
        }
    }

    pub(crate) fn info_of(&self, buffer: BufferRef) -> Option<TextureInfo> {
        match buffer {
            BufferRef::Scene(texture) => self.services.device.texture_info(texture),
            BufferRef::Cached(id) => {
                let buffer = self.textures.buffer(id);
                Some(TextureInfo {
                    size: buffer.size,
                    format: buffer.format,
                })
            }
        }
    }

    pub(crate) fn sampler_of(&self, buffer: BufferRef) -> Option<SamplerDesc> {
        match buffer {
            BufferRef::Scene(_) => None,
            BufferRef::Cached(id) => self.textures.buffer(id).sampler,
        }
    }

    // ─── Commands ─────────────────────────────────────────────────────

    fn allocate_buffer(&mut self, run: &EffectRun<'_>, cmd: &AllocateBuffer) {
        let Some(format) = cmd
            .format
            .or_else(|| self.info_of(run.input).map(|info| info.format))
        else {
            log::warn!(
                "AllocateBuffer '{}': effect input has no known format",
                cmd.name
            );
            return;
        };
        let size = self.frame.scaled_size(cmd.size_multiplier);

        match self
            .textures
            .get(&mut *self.services.device, &cmd.name, size, format)
        {
            Ok(id) => {
                let buffer = self.textures.buffer_mut(id);
                buffer.sampler = Some(SamplerDesc::new(cmd.filter, cmd.wrap));
                buffer.lifetime = cmd.lifetime;
            }
            Err(err) => log::error!("Failed to allocate effect buffer '{}': {err}", cmd.name),
        }
    }

    fn apply_buffer_value(&mut self, run: &mut EffectRun<'_>, cmd: &ApplyBufferValue) {
        let source = match &cmd.buffer {
            None => run.input,
            Some(name) => match self.textures.find(name) {
                Some(id) => BufferRef::Cached(id),
                None => {
                    log::warn!("ApplyBufferValue: no buffer named '{name}'");
                    return;
                }
            },
        };

        match &cmd.param {
            None => run.current_input = source,
            Some(param) => {
                let texture = self.texture_of(source);
                let sampler = self.sampler_of(source);
                run.pass.bind_texture(param, Some(texture), sampler);
            }
        }
    }

    fn bind_shader(&mut self, run: &mut EffectRun<'_>, cmd: &BindShader) {
        let key = PipelineKey {
            shader_key: cmd.shader_key.clone(),
            effect: run.effect.id(),
            pass_index: cmd.pass_index,
        };

        let compiled = self.pipelines.get_or_compile(
            &key,
            &mut *self.services.device,
            self.services.shaders,
        );
        match compiled {
            Ok(_) => run.pass.activate(Some(key)),
            Err(err) => {
                log::warn!(
                    "Effect '{}': shader '{}' unavailable, pass disabled: {err}",
                    run.effect.class_name,
                    cmd.shader_key
                );
                run.pass.activate(None);
            }
        }
    }

    fn bind_target(&mut self, run: &mut EffectRun<'_>, cmd: &BindTarget) {
        let format = cmd
            .format
            .or(run.effect.output_format)
            .or_else(|| self.info_of(run.current_input).map(|info| info.format));
        let Some(format) = format else {
            log::warn!(
                "BindTarget in effect '{}': cannot determine output format",
                run.effect.class_name
            );
            return;
        };
        log::trace!("Target format {format:?}");

        // Distinct per pass within one frame. A previous effect that never
        // drew leaves its output under the current slot's name.
        let mut name = self.frame.output_name();
        if let BufferRef::Cached(input) = run.input
            && self.textures.buffer(input).is_named(&name)
        {
            name.push_str("_next");
        }
        let size = self.frame.output_size;
        match self
            .textures
            .get(&mut *self.services.device, &name, size, format)
        {
            Ok(id) => {
                run.current_output = Some(id);
                run.final_output = Some(id);
            }
            Err(err) => log::error!("Failed to allocate effect output '{name}': {err}"),
        }
    }
}
