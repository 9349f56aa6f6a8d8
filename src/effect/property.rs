//! Effect properties and uniform values.
//!
//! Scalar properties carry a [`UniformValue`] together with the
//! [`ShaderDataType`] the shader declares for them. The value is converted to
//! the declared type before it is written into a uniform block, so a property
//! authored as `Float(1.0)` can feed an `i32` uniform.

use std::path::PathBuf;
use std::sync::Arc;

use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// Data type of a uniform as declared by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDataType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Bool,
    Mat3,
    Mat4,
}

impl ShaderDataType {
    /// Size in bytes of this type inside a WGSL uniform block.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::Bool => 4,
            Self::Vec2 | Self::IVec2 | Self::UVec2 => 8,
            Self::Vec3 | Self::IVec3 | Self::UVec3 => 12,
            Self::Vec4 | Self::IVec4 | Self::UVec4 => 16,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }

    /// Number of scalar components (matrices report 0).
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::Bool => 1,
            Self::Vec2 | Self::IVec2 | Self::UVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::UVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::UVec4 => 4,
            Self::Mat3 | Self::Mat4 => 0,
        }
    }
}

/// A typed uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UInt(u32),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
    Bool(bool),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    #[must_use]
    pub fn data_type(&self) -> ShaderDataType {
        match self {
            Self::Float(_) => ShaderDataType::Float,
            Self::Vec2(_) => ShaderDataType::Vec2,
            Self::Vec3(_) => ShaderDataType::Vec3,
            Self::Vec4(_) => ShaderDataType::Vec4,
            Self::Int(_) => ShaderDataType::Int,
            Self::IVec2(_) => ShaderDataType::IVec2,
            Self::IVec3(_) => ShaderDataType::IVec3,
            Self::IVec4(_) => ShaderDataType::IVec4,
            Self::UInt(_) => ShaderDataType::UInt,
            Self::UVec2(_) => ShaderDataType::UVec2,
            Self::UVec3(_) => ShaderDataType::UVec3,
            Self::UVec4(_) => ShaderDataType::UVec4,
            Self::Bool(_) => ShaderDataType::Bool,
            Self::Mat3(_) => ShaderDataType::Mat3,
            Self::Mat4(_) => ShaderDataType::Mat4,
        }
    }

    /// Converts the value to `ty`.
    ///
    /// Scalars and vectors convert between float, signed, unsigned and bool
    /// component kinds as long as the component count matches. Matrices only
    /// convert to themselves. Returns `None` for incompatible shapes.
    #[must_use]
    pub fn convert(&self, ty: ShaderDataType) -> Option<UniformValue> {
        if self.data_type() == ty {
            return Some(*self);
        }
        if ty.components() == 0 || ty.components() != self.data_type().components() {
            return None;
        }

        let c = self.as_f32_components();
        let value = match ty {
            ShaderDataType::Float => Self::Float(c[0]),
            ShaderDataType::Vec2 => Self::Vec2(Vec2::new(c[0], c[1])),
            ShaderDataType::Vec3 => Self::Vec3(Vec3::new(c[0], c[1], c[2])),
            ShaderDataType::Vec4 => Self::Vec4(Vec4::new(c[0], c[1], c[2], c[3])),
            ShaderDataType::Int => Self::Int(c[0] as i32),
            ShaderDataType::IVec2 => Self::IVec2(IVec2::new(c[0] as i32, c[1] as i32)),
            ShaderDataType::IVec3 => {
                Self::IVec3(IVec3::new(c[0] as i32, c[1] as i32, c[2] as i32))
            }
            ShaderDataType::IVec4 => Self::IVec4(IVec4::new(
                c[0] as i32,
                c[1] as i32,
                c[2] as i32,
                c[3] as i32,
            )),
            ShaderDataType::UInt => Self::UInt(c[0] as u32),
            ShaderDataType::UVec2 => Self::UVec2(UVec2::new(c[0] as u32, c[1] as u32)),
            ShaderDataType::UVec3 => {
                Self::UVec3(UVec3::new(c[0] as u32, c[1] as u32, c[2] as u32))
            }
            ShaderDataType::UVec4 => Self::UVec4(UVec4::new(
                c[0] as u32,
                c[1] as u32,
                c[2] as u32,
                c[3] as u32,
            )),
            ShaderDataType::Bool => Self::Bool(c[0] != 0.0),
            ShaderDataType::Mat3 | ShaderDataType::Mat4 => return None,
        };
        Some(value)
    }

    fn as_f32_components(&self) -> [f32; 4] {
        match *self {
            Self::Float(v) => [v, 0.0, 0.0, 0.0],
            Self::Vec2(v) => [v.x, v.y, 0.0, 0.0],
            Self::Vec3(v) => [v.x, v.y, v.z, 0.0],
            Self::Vec4(v) => v.to_array(),
            Self::Int(v) => [v as f32, 0.0, 0.0, 0.0],
            Self::IVec2(v) => [v.x as f32, v.y as f32, 0.0, 0.0],
            Self::IVec3(v) => [v.x as f32, v.y as f32, v.z as f32, 0.0],
            Self::IVec4(v) => v.as_vec4().to_array(),
            Self::UInt(v) => [v as f32, 0.0, 0.0, 0.0],
            Self::UVec2(v) => [v.x as f32, v.y as f32, 0.0, 0.0],
            Self::UVec3(v) => [v.x as f32, v.y as f32, v.z as f32, 0.0],
            Self::UVec4(v) => v.as_vec4().to_array(),
            Self::Bool(v) => [if v { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            Self::Mat3(_) | Self::Mat4(_) => [0.0; 4],
        }
    }

    /// Writes the value in WGSL uniform layout into `dst`.
    ///
    /// `dst` must hold at least [`ShaderDataType::size`] bytes. Booleans are
    /// written as `u32`, `mat3x3` columns are padded to 16 bytes.
    pub fn write_bytes(&self, dst: &mut [u8]) {
        fn put<T: bytemuck::Pod>(dst: &mut [u8], offset: usize, value: &T) {
            let bytes = bytemuck::bytes_of(value);
            dst[offset..offset + bytes.len()].copy_from_slice(bytes);
        }

        match self {
            Self::Float(v) => put(dst, 0, v),
            Self::Vec2(v) => put(dst, 0, v),
            Self::Vec3(v) => put(dst, 0, v),
            Self::Vec4(v) => put(dst, 0, v),
            Self::Int(v) => put(dst, 0, v),
            Self::IVec2(v) => put(dst, 0, v),
            Self::IVec3(v) => put(dst, 0, v),
            Self::IVec4(v) => put(dst, 0, v),
            Self::UInt(v) => put(dst, 0, v),
            Self::UVec2(v) => put(dst, 0, v),
            Self::UVec3(v) => put(dst, 0, v),
            Self::UVec4(v) => put(dst, 0, v),
            Self::Bool(v) => put(dst, 0, &u32::from(*v)),
            Self::Mat3(m) => {
                put(dst, 0, &m.x_axis);
                put(dst, 16, &m.y_axis);
                put(dst, 32, &m.z_axis);
            }
            Self::Mat4(m) => put(dst, 0, m),
        }
    }
}

/// A named scalar property on an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: UniformValue,
    /// Type the shader declares for this property.
    pub data_type: ShaderDataType,
}

impl Property {
    /// Creates a property whose declared type is the value's own type.
    pub fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            data_type: value.data_type(),
            value,
        }
    }

    #[must_use]
    pub fn with_data_type(mut self, data_type: ShaderDataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// Source of the image referenced by a texture property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image file decoded by the image manager.
    Path(PathBuf),
    /// Already decoded RGBA8 pixels, identified by `key`.
    Rgba8 {
        key: String,
        width: u32,
        height: u32,
        pixels: Arc<[u8]>,
    },
}

impl ImageSource {
    /// Identity used when caching the uploaded texture.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Path(path) => format!("file:{}", path.display()),
            Self::Rgba8 { key, .. } => format!("mem:{key}"),
        }
    }

    /// Whether the source refers to anything loadable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.as_os_str().is_empty(),
            Self::Rgba8 { pixels, .. } => pixels.is_empty(),
        }
    }
}

/// A named texture property on an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureProperty {
    pub name: String,
    pub image: Option<ImageSource>,
    pub min_filter: wgpu::FilterMode,
    pub mag_filter: wgpu::FilterMode,
    /// `Some` only when mipmaps should be generated for the image.
    pub mip_filter: Option<wgpu::MipmapFilterMode>,
    pub wrap: wgpu::AddressMode,
}

impl TextureProperty {
    pub fn new(name: impl Into<String>, image: Option<ImageSource>) -> Self {
        Self {
            name: name.into(),
            image,
            min_filter: wgpu::FilterMode::Linear,
            mag_filter: wgpu::FilterMode::Linear,
            mip_filter: None,
            wrap: wgpu::AddressMode::ClampToEdge,
        }
    }

    #[must_use]
    pub fn with_mipmaps(mut self, filter: wgpu::MipmapFilterMode) -> Self {
        self.mip_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_wrap(mut self, wrap: wgpu::AddressMode) -> Self {
        self.wrap = wrap;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: wgpu::FilterMode) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self
    }
}
