//! Effect commands.
//!
//! An effect is a small program: an ordered list of [`Command`]s that the
//! interpreter executes once per frame. The enum is closed, so every kind is
//! matched exhaustively.

use std::fmt;

use super::property::UniformValue;

/// How long a named buffer keeps its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferLifetime {
    /// Name is cleared at the end of each chain execution.
    #[default]
    Transient,
    /// Survives across frames until reallocated with a different size or format.
    Scene,
}

/// Allocates (or reuses) a named intermediate buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocateBuffer {
    pub name: String,
    /// Scale relative to the frame output size.
    pub size_multiplier: f32,
    /// Inherits the effect input format when `None`.
    pub format: Option<wgpu::TextureFormat>,
    pub filter: wgpu::FilterMode,
    pub wrap: wgpu::AddressMode,
    pub lifetime: BufferLifetime,
}

impl AllocateBuffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_multiplier: 1.0,
            format: None,
            filter: wgpu::FilterMode::Linear,
            wrap: wgpu::AddressMode::ClampToEdge,
            lifetime: BufferLifetime::Transient,
        }
    }

    #[must_use]
    pub fn with_size_multiplier(mut self, size_multiplier: f32) -> Self {
        self.size_multiplier = size_multiplier;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn with_sampling(mut self, filter: wgpu::FilterMode, wrap: wgpu::AddressMode) -> Self {
        self.filter = filter;
        self.wrap = wrap;
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: BufferLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Binds a buffer (or the effect input) as a shader texture, or redirects
/// the pass input when no parameter is named.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyBufferValue {
    pub buffer: Option<String>,
    pub param: Option<String>,
}

/// Binds the frame depth texture under `param`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyDepthValue {
    pub param: String,
}

/// Pushes effect properties to the active shader. `None` applies all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyInstanceValue {
    pub property: Option<String>,
}

/// Pushes a literal value for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyValue {
    pub property: String,
    pub value: UniformValue,
}

/// Selects a named buffer as the pass output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindBuffer {
    pub name: String,
}

/// Resolves a shader pipeline and makes it active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindShader {
    pub shader_key: String,
    pub pass_index: u32,
}

/// Allocates the effect output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindTarget {
    pub format: Option<wgpu::TextureFormat>,
}

/// One interpreted instruction of an effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AllocateBuffer(AllocateBuffer),
    ApplyBufferValue(ApplyBufferValue),
    ApplyDepthValue(ApplyDepthValue),
    ApplyInstanceValue(ApplyInstanceValue),
    ApplyValue(ApplyValue),
    BindBuffer(BindBuffer),
    BindShader(BindShader),
    BindTarget(BindTarget),
    Render,
}

impl Command {
    // ─── Constructors ─────────────────────────────────────────────────

    pub fn bind_shader(shader_key: impl Into<String>, pass_index: u32) -> Self {
        Self::BindShader(BindShader {
            shader_key: shader_key.into(),
            pass_index,
        })
    }

    #[must_use]
    pub fn bind_target() -> Self {
        Self::BindTarget(BindTarget::default())
    }

    pub fn bind_buffer(name: impl Into<String>) -> Self {
        Self::BindBuffer(BindBuffer { name: name.into() })
    }

    /// `ApplyBufferValue` with both fields optional.
    pub fn apply_buffer(buffer: Option<&str>, param: Option<&str>) -> Self {
        Self::ApplyBufferValue(ApplyBufferValue {
            buffer: buffer.map(str::to_owned),
            param: param.map(str::to_owned),
        })
    }

    pub fn apply_depth(param: impl Into<String>) -> Self {
        Self::ApplyDepthValue(ApplyDepthValue {
            param: param.into(),
        })
    }

    #[must_use]
    pub fn apply_instance(property: Option<&str>) -> Self {
        Self::ApplyInstanceValue(ApplyInstanceValue {
            property: property.map(str::to_owned),
        })
    }

    pub fn apply_value(property: impl Into<String>, value: UniformValue) -> Self {
        Self::ApplyValue(ApplyValue {
            property: property.into(),
            value,
        })
    }

    // ─── Introspection ────────────────────────────────────────────────

    /// Kind name used in logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::AllocateBuffer(_) => "AllocateBuffer",
            Self::ApplyBufferValue(_) => "ApplyBufferValue",
            Self::ApplyDepthValue(_) => "ApplyDepthValue",
            Self::ApplyInstanceValue(_) => "ApplyInstanceValue",
            Self::ApplyValue(_) => "ApplyValue",
            Self::BindBuffer(_) => "BindBuffer",
            Self::BindShader(_) => "BindShader",
            Self::BindTarget(_) => "BindTarget",
            Self::Render => "Render",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind_name();
        match self {
            Self::AllocateBuffer(c) => write!(
                f,
                "{kind} name={} size={} format={:?} filter={:?} wrap={:?} lifetime={:?}",
                c.name, c.size_multiplier, c.format, c.filter, c.wrap, c.lifetime
            ),
            Self::ApplyBufferValue(c) => write!(
                f,
                "{kind} buffer={} param={}",
                c.buffer.as_deref().unwrap_or("<input>"),
                c.param.as_deref().unwrap_or("<none>")
            ),
            Self::ApplyDepthValue(c) => write!(f, "{kind} param={}", c.param),
            Self::ApplyInstanceValue(c) => write!(
                f,
                "{kind} property={}",
                c.property.as_deref().unwrap_or("<all>")
            ),
            Self::ApplyValue(c) => write!(f, "{kind} property={} value={:?}", c.property, c.value),
            Self::BindBuffer(c) => write!(f, "{kind} name={}", c.name),
            Self::BindShader(c) => {
                write!(f, "{kind} shader={} pass={}", c.shader_key, c.pass_index)
            }
            Self::BindTarget(c) => write!(f, "{kind} format={:?}", c.format),
            Self::Render => f.write_str(kind),
        }
    }
}
