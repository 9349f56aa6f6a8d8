//! WGSL Shader Reflection
//!
//! Extracts the resources an effect pass binds from WGSL source using naga:
//!
//! - sampled textures, each optionally paired with a sampler named
//!   `<texture>_sampler`
//! - at most one uniform block (`var<uniform>` of struct type), with the
//!   offset and type of every member
//!
//! Vertex and fragment stages are compiled from separate sources; their
//! reflections are merged so one bind group layout covers both.
//!
//! Only bind group 0 is supported. Storage buffers, storage textures and
//! unpaired samplers are rejected.

use rustc_hash::FxHashMap;

use crate::effect::ShaderDataType;
use crate::errors::{EffectError, Result};

/// Binding slots of one sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub binding: u32,
    pub sampler_binding: Option<u32>,
    /// `texture_depth_2d` rather than a float texture.
    pub depth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub ty: ShaderDataType,
}

/// Layout of the uniform block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBlockLayout {
    pub binding: u32,
    /// Struct size in bytes, including trailing padding.
    pub size: u32,
    pub members: FxHashMap<String, UniformMember>,
}

/// Resources declared by a pipeline's shader stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderReflection {
    pub textures: FxHashMap<String, TextureSlot>,
    pub uniform_block: Option<UniformBlockLayout>,
}

impl ShaderReflection {
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&TextureSlot> {
        self.textures.get(name)
    }

    #[must_use]
    pub fn uniform_member(&self, name: &str) -> Option<&UniformMember> {
        self.uniform_block.as_ref()?.members.get(name)
    }

    /// Folds another stage's reflection into this one.
    ///
    /// Resources declared by both stages must agree on their binding slots
    /// and member offsets.
    pub fn merge(&mut self, other: ShaderReflection) -> Result<()> {
        for (name, slot) in other.textures {
            match self.textures.get(&name) {
                Some(existing) if *existing != slot => {
                    return Err(EffectError::ShaderReflection(format!(
                        "texture '{name}' is declared with different bindings in each stage"
                    )));
                }
                Some(_) => {}
                None => {
                    self.textures.insert(name, slot);
                }
            }
        }

        let Some(block) = other.uniform_block else {
            return Ok(());
        };
        match &mut self.uniform_block {
            None => self.uniform_block = Some(block),
            Some(existing) => {
                if existing.binding != block.binding {
                    return Err(EffectError::ShaderReflection(
                        "uniform block is declared at different bindings in each stage".into(),
                    ));
                }
                existing.size = existing.size.max(block.size);
                for (name, member) in block.members {
                    match existing.members.get(&name) {
                        Some(m) if *m != member => {
                            return Err(EffectError::ShaderReflection(format!(
                                "uniform '{name}' has a different layout in each stage"
                            )));
                        }
                        Some(_) => {}
                        None => {
                            existing.members.insert(name, member);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every binding slot in use, for layout validation.
    fn bindings(&self) -> impl Iterator<Item = u32> + '_ {
        self.uniform_block
            .iter()
            .map(|b| b.binding)
            .chain(
                self.textures
                    .values()
                    .flat_map(|t| std::iter::once(t.binding).chain(t.sampler_binding)),
            )
    }
}

/// Parses and validates one WGSL stage.
pub fn parse_module(label: &str, source: &str) -> Result<naga::Module> {
    let module =
        naga::front::wgsl::parse_str(source).map_err(|e| EffectError::ShaderCompile {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| EffectError::ShaderCompile {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

    Ok(module)
}

/// Parses both stages and returns their merged reflection.
pub fn reflect_stages(
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ShaderReflection> {
    let vertex = parse_module(&format!("{label} (vertex)"), vertex_source)?;
    let fragment = parse_module(&format!("{label} (fragment)"), fragment_source)?;

    let mut reflection = reflect_module(&vertex)?;
    reflection.merge(reflect_module(&fragment)?)?;

    let mut seen = rustc_hash::FxHashSet::default();
    for binding in reflection.bindings() {
        if !seen.insert(binding) {
            return Err(EffectError::ShaderReflection(format!(
                "binding {binding} is used by more than one resource"
            )));
        }
    }
    Ok(reflection)
}

/// Reflects the resources of a single module.
pub fn reflect_module(module: &naga::Module) -> Result<ShaderReflection> {
    let mut reflection = ShaderReflection::default();
    let mut samplers: Vec<(String, u32)> = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        if binding.group != 0 {
            return Err(EffectError::ShaderReflection(format!(
                "'{name}' uses bind group {}; only group 0 is supported",
                binding.group
            )));
        }

        match (&var.space, &module.types[var.ty].inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                if reflection.uniform_block.is_some() {
                    return Err(EffectError::ShaderReflection(
                        "more than one uniform block declared".into(),
                    ));
                }
                let members = members
                    .iter()
                    .filter_map(|m| {
                        let ty = data_type(&module.types[m.ty].inner)?;
                        Some((m.name.clone()?, UniformMember { offset: m.offset, ty }))
                    })
                    .collect();
                reflection.uniform_block = Some(UniformBlockLayout {
                    binding: binding.binding,
                    size: *span,
                    members,
                });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { dim, arrayed, class }) => {
                let depth = match class {
                    naga::ImageClass::Sampled { multi: false, .. } => false,
                    naga::ImageClass::Depth { multi: false } => true,
                    _ => {
                        return Err(EffectError::ShaderReflection(format!(
                            "texture '{name}' must be a single-sampled texture_2d or texture_depth_2d"
                        )));
                    }
                };
                if *dim != naga::ImageDimension::D2 || *arrayed {
                    return Err(EffectError::ShaderReflection(format!(
                        "texture '{name}' must be two-dimensional"
                    )));
                }
                reflection.textures.insert(
                    name,
                    TextureSlot {
                        binding: binding.binding,
                        sampler_binding: None,
                        depth,
                    },
                );
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false }) => {
                samplers.push((name, binding.binding));
            }
            _ => {
                return Err(EffectError::ShaderReflection(format!(
                    "unsupported resource '{name}' at binding {}",
                    binding.binding
                )));
            }
        }
    }

    for (sampler_name, sampler_binding) in samplers {
        let texture = sampler_name
            .strip_suffix("_sampler")
            .and_then(|tex| reflection.textures.get_mut(tex));
        match texture {
            Some(slot) => slot.sampler_binding = Some(sampler_binding),
            None => {
                return Err(EffectError::ShaderReflection(format!(
                    "sampler '{sampler_name}' has no matching texture"
                )));
            }
        }
    }

    Ok(reflection)
}

fn data_type(inner: &naga::TypeInner) -> Option<ShaderDataType> {
    use naga::{ScalarKind as K, VectorSize as S};

    let ty = match *inner {
        naga::TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            K::Float => ShaderDataType::Float,
            K::Sint => ShaderDataType::Int,
            K::Uint => ShaderDataType::UInt,
            _ => return None,
        },
        naga::TypeInner::Vector { size, scalar } if scalar.width == 4 => {
            match (scalar.kind, size) {
                (K::Float, S::Bi) => ShaderDataType::Vec2,
                (K::Float, S::Tri) => ShaderDataType::Vec3,
                (K::Float, S::Quad) => ShaderDataType::Vec4,
                (K::Sint, S::Bi) => ShaderDataType::IVec2,
                (K::Sint, S::Tri) => ShaderDataType::IVec3,
                (K::Sint, S::Quad) => ShaderDataType::IVec4,
                (K::Uint, S::Bi) => ShaderDataType::UVec2,
                (K::Uint, S::Tri) => ShaderDataType::UVec3,
                (K::Uint, S::Quad) => ShaderDataType::UVec4,
                _ => return None,
            }
        }
        naga::TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar.kind == K::Float && scalar.width == 4 => match (columns, rows) {
            (S::Tri, S::Tri) => ShaderDataType::Mat3,
            (S::Quad, S::Quad) => ShaderDataType::Mat4,
            _ => return None,
        },
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r"
struct Params {
    mvp: mat4x4<f32>,
    size: vec2<f32>,
    strength: f32,
    steps: i32,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var input_texture: texture_2d<f32>;
@group(0) @binding(2) var input_texture_sampler: sampler;
@group(0) @binding(3) var depth_map: texture_depth_2d;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let d = textureLoad(depth_map, vec2<i32>(0, 0), 0);
    return textureSample(input_texture, input_texture_sampler, uv) * params.strength + vec4<f32>(d);
}
";

    const VERTEX: &str = r"
struct Params {
    mvp: mat4x4<f32>,
    size: vec2<f32>,
    strength: f32,
    steps: i32,
};

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return params.mvp * vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}
";

    #[test]
    fn test_reflects_textures_and_uniforms() {
        let reflection = reflect_stages("test", VERTEX, FRAGMENT).unwrap();

        let input = reflection.texture("input_texture").unwrap();
        assert_eq!(input.binding, 1);
        assert_eq!(input.sampler_binding, Some(2));
        assert!(!input.depth);

        let depth = reflection.texture("depth_map").unwrap();
        assert!(depth.depth);
        assert_eq!(depth.sampler_binding, None);

        let block = reflection.uniform_block.as_ref().unwrap();
        assert_eq!(block.binding, 0);
        assert_eq!(block.size, 80);
        assert_eq!(
            reflection.uniform_member("size"),
            Some(&UniformMember {
                offset: 64,
                ty: ShaderDataType::Vec2
            })
        );
        assert_eq!(reflection.uniform_member("steps").unwrap().ty, ShaderDataType::Int);
        assert_eq!(reflection.uniform_member("mvp").unwrap().ty, ShaderDataType::Mat4);
    }

    #[test]
    fn test_unpaired_sampler_is_rejected() {
        let source = r"
@group(0) @binding(0) var lonely: sampler;
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";
        let module = parse_module("unpaired", source).unwrap();
        assert!(matches!(
            reflect_module(&module),
            Err(EffectError::ShaderReflection(_))
        ));
    }

    #[test]
    fn test_invalid_source_reports_compile_error() {
        let err = parse_module("broken", "fn fs_main( {").unwrap_err();
        assert!(matches!(err, EffectError::ShaderCompile { .. }));
    }

    #[test]
    fn test_conflicting_stage_layouts_fail_merge() {
        let mut a = ShaderReflection::default();
        a.textures.insert(
            "t".into(),
            TextureSlot {
                binding: 1,
                sampler_binding: None,
                depth: false,
            },
        );
        let mut b = ShaderReflection::default();
        b.textures.insert(
            "t".into(),
            TextureSlot {
                binding: 2,
                sampler_binding: None,
                depth: false,
            },
        );
        assert!(a.merge(b).is_err());
    }
}
