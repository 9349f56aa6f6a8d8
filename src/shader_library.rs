//! Effect Shader Sources
//!
//! The effect system asks a [`ShaderSourceProvider`] for the WGSL of each
//! stage of a shader key. [`ShaderLibrary`] is the default provider.
//!
//! ## Lookup order
//!
//! | Source | Files / API |
//! |--------|-------------|
//! | Runtime registrations | [`ShaderLibrary::register`] |
//! | Built-in effects      | `<key>.vert.wgsl` / `<key>.frag.wgsl`, embedded |
//!
//! A built-in key that ships only a fragment stage uses the shared
//! `fullscreen` vertex stage.
//!
//! ## Shader interface
//!
//! - vertex entry point `vs_main`, fragment entry point `fs_main`
//! - every resource in bind group 0
//! - a texture `foo` is sampled through a sampler named `foo_sampler`
//! - the pass input is `input_texture`
//! - the vertex stage may call `effect_texture_map_uv(uv)`, which the effect
//!   system prepends to map image UVs onto backend texture coordinates

use std::fmt;

use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;

use crate::errors::{EffectError, Result};

#[derive(RustEmbed)]
#[folder = "src/shaders/effects"]
struct EffectShaderAssets;

const SHARED_VERTEX_KEY: &str = "fullscreen";

/// Programmable stage of an effect pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            Self::Vertex => "vert.wgsl",
            Self::Fragment => "frag.wgsl",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies WGSL source for a shader key and stage.
pub trait ShaderSourceProvider {
    fn shader_source(&self, key: &str, stage: ShaderStage) -> Result<String>;
}

#[derive(Debug, Clone)]
struct RegisteredShader {
    vertex: String,
    fragment: String,
}

/// Built-in effect shaders plus runtime registrations.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    registered: FxHashMap<String, RegisteredShader>,
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the sources for `key`. Registrations take
    /// precedence over built-ins with the same key.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) {
        self.registered.insert(
            key.into(),
            RegisteredShader {
                vertex: vertex.into(),
                fragment: fragment.into(),
            },
        );
    }

    /// Registers a fragment stage paired with the shared full-screen vertex stage.
    pub fn register_fragment(&mut self, key: impl Into<String>, fragment: impl Into<String>) -> Result<()> {
        let vertex = Self::embedded(SHARED_VERTEX_KEY, ShaderStage::Vertex).ok_or_else(|| {
            EffectError::ShaderSourceMissing {
                key: SHARED_VERTEX_KEY.to_string(),
                stage: ShaderStage::Vertex.as_str(),
            }
        })?;
        self.register(key, vertex, fragment);
        Ok(())
    }

    pub fn unregister(&mut self, key: &str) -> bool {
        self.registered.remove(key).is_some()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.registered.contains_key(key)
            || Self::embedded(key, ShaderStage::Fragment).is_some()
    }

    /// Keys of the embedded effects, sorted.
    #[must_use]
    pub fn builtin_keys() -> Vec<String> {
        let mut keys: Vec<String> = EffectShaderAssets::iter()
            .filter_map(|file| {
                file.strip_suffix(".frag.wgsl").map(str::to_owned)
            })
            .collect();
        keys.sort();
        keys
    }

    fn embedded(key: &str, stage: ShaderStage) -> Option<String> {
        let file = EffectShaderAssets::get(&format!("{key}.{}", stage.file_suffix()))?;
        std::str::from_utf8(file.data.as_ref()).ok().map(str::to_owned)
    }
}

impl ShaderSourceProvider for ShaderLibrary {
    fn shader_source(&self, key: &str, stage: ShaderStage) -> Result<String> {
        if let Some(shader) = self.registered.get(key) {
            return Ok(match stage {
                ShaderStage::Vertex => shader.vertex.clone(),
                ShaderStage::Fragment => shader.fragment.clone(),
            });
        }

        let source = match stage {
            ShaderStage::Fragment => Self::embedded(key, stage),
            ShaderStage::Vertex => Self::embedded(key, stage).or_else(|| {
                Self::embedded(key, ShaderStage::Fragment)
                    .and_then(|_| Self::embedded(SHARED_VERTEX_KEY, ShaderStage::Vertex))
            }),
        };

        source.ok_or_else(|| EffectError::ShaderSourceMissing {
            key: key.to_string(),
            stage: stage.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys() {
        let keys = ShaderLibrary::builtin_keys();
        for key in ["blur_horizontal", "blur_vertical", "depth_visualize", "passthrough"] {
            assert!(keys.iter().any(|k| k == key), "missing built-in {key}");
        }
        assert!(!keys.iter().any(|k| k == "fullscreen"));
    }

    #[test]
    fn test_builtin_uses_shared_vertex_stage() {
        let library = ShaderLibrary::new();
        let vertex = library
            .shader_source("passthrough", ShaderStage::Vertex)
            .unwrap();
        assert!(vertex.contains("fn vs_main"));
        let fragment = library
            .shader_source("passthrough", ShaderStage::Fragment)
            .unwrap();
        assert!(fragment.contains("fn fs_main"));
    }

    #[test]
    fn test_registration_overrides_builtin() {
        let mut library = ShaderLibrary::new();
        library.register("passthrough", "vs", "fs");
        assert_eq!(
            library.shader_source("passthrough", ShaderStage::Fragment).unwrap(),
            "fs"
        );
        assert!(library.unregister("passthrough"));
        assert_ne!(
            library.shader_source("passthrough", ShaderStage::Fragment).unwrap(),
            "fs"
        );
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let library = ShaderLibrary::new();
        let err = library
            .shader_source("does_not_exist", ShaderStage::Vertex)
            .unwrap_err();
        assert!(matches!(
            err,
            EffectError::ShaderSourceMissing { stage: "vertex", .. }
        ));
        assert!(!library.contains("does_not_exist"));
    }
}
