//! Property Binder
//!
//! Resolves values from an effect's property tables onto the active shader
//! pipeline: scalar properties become uniforms, texture properties and
//! buffers become named texture bindings.
//!
//! Bindings live in a [`PassContext`] scoped to one effect's command list.
//! Binding a shader starts a fresh set; for a repeated name the last write
//! wins. Without an active pipeline every call here is a no-op.

use rustc_hash::FxHashMap;

use super::interpreter::{EffectRun, Interpreter};
use super::pipeline_cache::PipelineKey;
use crate::device::{SamplerDesc, TextureHandle};
use crate::effect::{
    ApplyDepthValue, ApplyInstanceValue, ApplyValue, Property, TextureProperty, UniformValue,
};
use crate::image_manager::MipMode;

/// A texture registered under a shader name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundTexture {
    /// `None` binds the device placeholder.
    pub texture: Option<TextureHandle>,
    pub sampler: SamplerDesc,
}

/// Binding state of the effect currently being interpreted.
#[derive(Debug, Default)]
pub struct PassContext {
    active: Option<PipelineKey>,
    textures: FxHashMap<String, BoundTexture>,
}

impl PassContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn active(&self) -> Option<&PipelineKey> {
        self.active.as_ref()
    }

    /// Makes `key` the active pipeline and drops all texture bindings.
    pub fn activate(&mut self, key: Option<PipelineKey>) {
        self.active = key;
        self.textures.clear();
    }

    /// Registers `texture` under `name`. A missing sampler description
    /// falls back to linear/clamp.
    pub fn bind_texture(
        &mut self,
        name: &str,
        texture: Option<TextureHandle>,
        sampler: Option<SamplerDesc>,
    ) {
        if self.active.is_none() {
            return;
        }
        self.textures.insert(
            name.to_string(),
            BoundTexture {
                texture,
                sampler: sampler.unwrap_or_default(),
            },
        );
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&BoundTexture> {
        self.textures.get(name)
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &BoundTexture)> {
        self.textures.iter().map(|(name, bound)| (name.as_str(), bound))
    }
}

impl Interpreter<'_, '_> {
    pub(super) fn apply_depth_value(&mut self, run: &mut EffectRun<'_>, cmd: &ApplyDepthValue) {
        let depth = self.frame.depth_texture;
        run.pass
            .bind_texture(&cmd.param, depth, Some(SamplerDesc::NEAREST_CLAMP));
    }

    pub(super) fn apply_instance_value(
        &mut self,
        run: &mut EffectRun<'_>,
        cmd: &ApplyInstanceValue,
    ) {
        if run.pass.active().is_none() {
            return;
        }
        let effect = run.effect;
        let matches = |name: &str| cmd.property.as_deref().is_none_or(|wanted| wanted == name);

        let mut applied = 0usize;
        for property in effect.properties.iter().filter(|p| matches(&p.name)) {
            self.set_property_uniform(run, property, &property.value);
            applied += 1;
        }
        for property in effect.texture_properties.iter().filter(|p| matches(&p.name)) {
            self.bind_texture_property(run, property);
            applied += 1;
        }

        if applied == 0
            && let Some(name) = &cmd.property
        {
            log::warn!(
                "Effect '{}' has no property '{name}'",
                effect.class_name
            );
        }
    }

    pub(super) fn apply_value(&mut self, run: &mut EffectRun<'_>, cmd: &ApplyValue) {
        if run.pass.active().is_none() {
            return;
        }
        match run.effect.property(&cmd.property) {
            Some(property) => self.set_property_uniform(run, property, &cmd.value),
            None => log::warn!(
                "Could not find property '{}' on effect '{}'",
                cmd.property,
                run.effect.class_name
            ),
        }
    }

    /// Writes `value` typed by the property's declared type.
    fn set_property_uniform(
        &mut self,
        run: &EffectRun<'_>,
        property: &Property,
        value: &UniformValue,
    ) {
        let Some(pipeline) = run.pass.active().and_then(|key| self.pipelines.get_mut(key)) else {
            return;
        };
        if !pipeline.set_uniform(&property.name, value, property.data_type) {
            log::trace!("Property '{}' is not used by the shader", property.name);
        }
    }

    fn bind_texture_property(&mut self, run: &mut EffectRun<'_>, property: &TextureProperty) {
        let mip_mode = if property.mip_filter.is_some() {
            MipMode::GenerateMips
        } else {
            MipMode::NoMips
        };

        let texture = property.image.as_ref().and_then(|image| {
            let services = &mut *self.services;
            let loaded = services
                .images
                .load_image(&mut *services.device, image, mip_mode);
            if loaded.is_none() {
                log::warn!(
                    "Image for texture property '{}' is unavailable; binding placeholder",
                    property.name
                );
            }
            loaded
        });

        let sampler = SamplerDesc {
            min_filter: property.min_filter,
            mag_filter: property.mag_filter,
            mipmap_filter: property.mip_filter,
            address_mode_u: property.wrap,
            address_mode_v: property.wrap,
        };
        run.pass.bind_texture(&property.name, texture, Some(sampler));
    }
}
