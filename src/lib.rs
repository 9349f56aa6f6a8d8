#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod device;
pub mod effect;
pub mod effects;
pub mod errors;
pub mod image_manager;
pub mod settings;
pub mod shader_library;
pub mod utils;

pub use device::wgpu_device::WgpuDevice;
pub use device::{BackendCaps, GraphicsDevice, SamplerDesc, TextureHandle};
pub use effect::{
    AllocateBuffer, BufferLifetime, Command, Effect, EffectChain, EffectId, ImageSource, Property,
    ShaderDataType, TextureProperty, UniformValue,
};
pub use effects::{EffectServices, EffectSystem};
pub use errors::{EffectError, Result};
pub use image_manager::{ImageBufferManager, ImageManager, MipMode};
pub use settings::EffectSettings;
pub use shader_library::{ShaderLibrary, ShaderSourceProvider, ShaderStage};
