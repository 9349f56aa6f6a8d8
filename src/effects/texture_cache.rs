//! Effect Texture Cache
//!
//! Owns every intermediate texture the effect chain renders into. Buffers are
//! addressed by name while in use and recycled when released.
//!
//! # Design
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                  EffectTextureCache                   │
//! │                                                       │
//! │  buffers: [EffectBuffer]  ←── indexed by BufferId     │
//! │           name: Some("tmp") | None (free slot)        │
//! │  pending_clears: [RenderTargetHandle]                 │
//! │                                                       │
//! │  get(name, size, format) → BufferId                   │
//! │  release(id)        (clears a transient name)         │
//! │  teardown(device)   (destroys GPU objects)            │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Releasing a buffer never destroys it: the slot becomes anonymous and is
//! picked up by the next request, rebuilt in place only if the requested
//! size or format differs. Targets that were (re)built are queued for a
//! clear before their first use, since a later pass may sample them before
//! anything was drawn into them.

use glam::UVec2;
use smallvec::SmallVec;

use crate::device::{GraphicsDevice, RenderTargetHandle, SamplerDesc, TextureHandle};
use crate::effect::BufferLifetime;
use crate::errors::Result;

/// Index of a buffer in the cache. Stable until [`EffectTextureCache::teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl BufferId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A cached texture together with the render target writing into it.
#[derive(Debug, Clone)]
pub struct EffectBuffer {
    /// `None` marks a free slot.
    pub name: Option<String>,
    pub texture: TextureHandle,
    pub render_target: RenderTargetHandle,
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    /// Sampling used when this buffer is bound; linear/clamp when `None`.
    pub sampler: Option<SamplerDesc>,
    pub lifetime: BufferLifetime,
}

impl EffectBuffer {
    #[inline]
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

#[derive(Debug, Default)]
pub struct EffectTextureCache {
    buffers: Vec<EffectBuffer>,
    pending_clears: SmallVec<[RenderTargetHandle; 4]>,
}

impl EffectTextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &EffectBuffer)> {
        self.buffers
            .iter()
            .enumerate()
            .map(|(i, b)| (BufferId(i as u32), b))
    }

    /// Exact name lookup.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<BufferId> {
        self.buffers
            .iter()
            .position(|b| b.is_named(name))
            .map(|i| BufferId(i as u32))
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self, id: BufferId) -> &EffectBuffer {
        &self.buffers[id.index()]
    }

    #[inline]
    pub fn buffer_mut(&mut self, id: BufferId) -> &mut EffectBuffer {
        &mut self.buffers[id.index()]
    }

    /// Returns a buffer named `name` with the given size and format.
    ///
    /// Resolution order: the buffer already carrying `name`, then a free slot
    /// (one matching size and format first), then a new allocation. A reused
    /// slot with a different size or format is rebuilt in place.
    pub fn get(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Result<BufferId> {
        let existing = self.find(name).map(BufferId::index).or_else(|| {
            let free = |b: &EffectBuffer| b.name.is_none();
            self.buffers
                .iter()
                .position(|b| free(b) && b.size == size && b.format == format)
                .or_else(|| self.buffers.iter().position(free))
                .inspect(|&i| {
                    log::trace!("Reusing free effect buffer slot {i} for '{name}'");
                })
        });

        let index = match existing {
            Some(index) => {
                let buffer = &mut self.buffers[index];
                if buffer.name.is_none() {
                    buffer.sampler = None;
                    buffer.lifetime = BufferLifetime::Transient;
                }
                if buffer.size != size || buffer.format != format {
                    log::debug!(
                        "Rebuilding effect buffer '{name}': {} {:?} -> {size} {format:?}",
                        buffer.size,
                        buffer.format
                    );
                    device.resize_texture(buffer.texture, size, format)?;
                    device.rebuild_render_target(buffer.render_target)?;
                    buffer.size = size;
                    buffer.format = format;
                    Self::queue_clear(&mut self.pending_clears, buffer.render_target);
                }
                index
            }
            None => {
                log::debug!("Allocating effect buffer '{name}' {size} {format:?}");
                let texture = device.create_texture(name, size, format)?;
                let render_target = match device.create_render_target(texture) {
                    Ok(target) => target,
                    Err(err) => {
                        device.destroy_texture(texture);
                        return Err(err);
                    }
                };
                Self::queue_clear(&mut self.pending_clears, render_target);
                self.buffers.push(EffectBuffer {
                    name: None,
                    texture,
                    render_target,
                    size,
                    format,
                    sampler: None,
                    lifetime: BufferLifetime::Transient,
                });
                self.buffers.len() - 1
            }
        };

        self.buffers[index].name = Some(name.to_string());
        Ok(BufferId(index as u32))
    }

    /// Clears the name of a transient buffer; scene-lifetime buffers keep theirs.
    pub fn release(&mut self, id: BufferId) {
        let buffer = &mut self.buffers[id.index()];
        if buffer.lifetime != BufferLifetime::Scene {
            buffer.name = None;
        }
    }

    pub fn release_all(&mut self) {
        for i in 0..self.buffers.len() {
            self.release(BufferId(i as u32));
        }
    }

    /// Destroys every buffer's device objects and empties the cache.
    pub fn teardown(&mut self, device: &mut dyn GraphicsDevice) {
        for buffer in self.buffers.drain(..) {
            device.destroy_render_target(buffer.render_target);
            device.destroy_texture(buffer.texture);
        }
        self.pending_clears.clear();
    }

    // ─── Pending Clears ───────────────────────────────────────────────

    #[must_use]
    pub fn pending_clears(&self) -> &[RenderTargetHandle] {
        &self.pending_clears
    }

    /// Takes the pending set, dropping `target` from it.
    ///
    /// `target` is about to be fully overwritten by a draw, so it needs no
    /// separate clear.
    pub(crate) fn take_pending_clears(
        &mut self,
        target: RenderTargetHandle,
    ) -> SmallVec<[RenderTargetHandle; 4]> {
        let mut pending = std::mem::take(&mut self.pending_clears);
        pending.retain(|rt| *rt != target);
        pending
    }

    fn queue_clear(pending: &mut SmallVec<[RenderTargetHandle; 4]>, target: RenderTargetHandle) {
        if !pending.contains(&target) {
            pending.push(target);
        }
    }
}
