//! Effect descriptions.
//!
//! The scene layer produces an [`EffectChain`]: an ordered list of
//! [`Effect`]s, each holding a command program and its property tables. The
//! effect system only ever reads these.
//!
//! # Identity
//!
//! Every [`Effect`] receives a process-unique [`EffectId`] when constructed.
//! Pipelines are cached per effect instance, so two effects sharing a shader
//! still get independent uniform state. `Effect` is intentionally not
//! `Clone`: a copy would alias the id.

pub mod command;
pub mod property;

use std::sync::atomic::{AtomicU64, Ordering};

pub use command::{
    AllocateBuffer, ApplyBufferValue, ApplyDepthValue, ApplyInstanceValue, ApplyValue,
    BindBuffer, BindShader, BindTarget, BufferLifetime, Command,
};
pub use property::{ImageSource, Property, ShaderDataType, TextureProperty, UniformValue};

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-instance effect identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One post-processing stage.
#[derive(Debug)]
pub struct Effect {
    id: EffectId,
    /// Debug name, used in log output.
    pub class_name: String,
    pub commands: Vec<Command>,
    pub properties: Vec<Property>,
    pub texture_properties: Vec<TextureProperty>,
    /// Format of the effect output; inherits the input format when `None`.
    pub output_format: Option<wgpu::TextureFormat>,
}

impl Effect {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            id: EffectId::next(),
            class_name: class_name.into(),
            commands: Vec::new(),
            properties: Vec::new(),
            texture_properties: Vec::new(),
            output_format: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> EffectId {
        self.id
    }

    // ─── Builder ──────────────────────────────────────────────────────

    #[must_use]
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn with_texture_property(mut self, property: TextureProperty) -> Self {
        self.texture_properties.push(property);
        self
    }

    #[must_use]
    pub fn with_output_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    // ─── Lookup ───────────────────────────────────────────────────────

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn texture_property(&self, name: &str) -> Option<&TextureProperty> {
        self.texture_properties.iter().find(|p| p.name == name)
    }

    /// Mutable access for the scene layer to update values between frames.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }
}

/// Ordered list of effects applied to one frame.
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Effect>,
}

impl EffectChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    #[must_use]
    pub fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Effect> {
        self.effects.iter()
    }

    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut [Effect] {
        &mut self.effects
    }
}

impl FromIterator<Effect> for EffectChain {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EffectChain {
    type Item = &'a Effect;
    type IntoIter = std::slice::Iter<'a, Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_ids_are_unique() {
        let a = Effect::new("A");
        let b = Effect::new("A");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_property_lookup() {
        let mut effect = Effect::new("Blur")
            .with_property(Property::new("amount", UniformValue::Float(2.0)));
        assert!(effect.property("missing").is_none());
        effect.property_mut("amount").unwrap().value = UniformValue::Float(4.0);
        assert_eq!(effect.property("amount").unwrap().value, UniformValue::Float(4.0));
    }

    #[test]
    fn test_chain_preserves_order() {
        let chain: EffectChain = ["A", "B", "C"].into_iter().map(Effect::new).collect();
        let names: Vec<_> = chain.iter().map(|e| e.class_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }
}
