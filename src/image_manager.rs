//! Image Loading for Texture Properties
//!
//! Effects may reference images (noise, lookup tables, masks) through their
//! texture properties. The effect system resolves them through an
//! [`ImageManager`]; [`ImageBufferManager`] is the default implementation.
//!
//! Images are decoded to RGBA8 with the `image` crate, optionally given a
//! full mip chain on the CPU, and uploaded once. Uploads are cached by source
//! and mip mode, so a property referenced every frame is decoded only once.
//! Sources that fail to load are remembered and not retried.

use glam::UVec2;
use image::RgbaImage;
use image::imageops::FilterType;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::device::{GraphicsDevice, TextureHandle, TextureUpload};
use crate::effect::ImageSource;
use crate::errors::{EffectError, Result};

/// Whether a loaded image gets mipmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipMode {
    #[default]
    NoMips,
    GenerateMips,
}

/// Resolves image sources to device textures.
pub trait ImageManager {
    /// Returns the texture for `source`, or `None` if it cannot be loaded.
    fn load_image(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &ImageSource,
        mip_mode: MipMode,
    ) -> Option<TextureHandle>;
}

type CacheKey = (String, MipMode);

/// Decodes, uploads and caches images.
#[derive(Debug, Default)]
pub struct ImageBufferManager {
    textures: FxHashMap<CacheKey, TextureHandle>,
    failed: FxHashSet<CacheKey>,
}

impl ImageBufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uploaded textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Destroys every uploaded texture and forgets failed sources.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, texture) in self.textures.drain() {
            device.destroy_texture(texture);
        }
        self.failed.clear();
    }

    fn decode(source: &ImageSource) -> Result<RgbaImage> {
        match source {
            ImageSource::Path(path) => Ok(image::open(path)?.to_rgba8()),
            ImageSource::Rgba8 {
                key,
                width,
                height,
                pixels,
            } => RgbaImage::from_raw(*width, *height, pixels.to_vec()).ok_or_else(|| {
                EffectError::ImageDecode(format!(
                    "'{key}': {} bytes do not make a {width}x{height} RGBA8 image",
                    pixels.len()
                ))
            }),
        }
    }

    fn upload(
        device: &mut dyn GraphicsDevice,
        label: &str,
        image: RgbaImage,
        mip_mode: MipMode,
    ) -> Result<TextureHandle> {
        let size = UVec2::new(image.width(), image.height());
        if size.min_element() == 0 {
            return Err(EffectError::ImageDecode(format!("'{label}' is empty")));
        }

        let levels = match mip_mode {
            MipMode::NoMips => vec![image.into_raw()],
            MipMode::GenerateMips => mip_chain(image),
        };

        device.create_texture_with_data(&TextureUpload {
            label,
            size,
            format: wgpu::TextureFormat::Rgba8Unorm,
            mip_levels: &levels,
        })
    }
}

impl ImageManager for ImageBufferManager {
    fn load_image(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &ImageSource,
        mip_mode: MipMode,
    ) -> Option<TextureHandle> {
        let key = (source.cache_key(), mip_mode);
        if let Some(&texture) = self.textures.get(&key) {
            return Some(texture);
        }
        if self.failed.contains(&key) || source.is_empty() {
            return None;
        }

        let result = Self::decode(source)
            .and_then(|image| Self::upload(device, &key.0, image, mip_mode));
        match result {
            Ok(texture) => {
                log::debug!("Loaded effect image {} ({mip_mode:?})", key.0);
                self.textures.insert(key, texture);
                Some(texture)
            }
            Err(err) => {
                log::warn!("Failed to load effect image {}: {err}", key.0);
                self.failed.insert(key);
                None
            }
        }
    }
}

/// Full mip chain down to 1x1, largest level first.
fn mip_chain(image: RgbaImage) -> Vec<Vec<u8>> {
    let (mut width, mut height) = image.dimensions();
    let mut levels = Vec::new();
    let mut current = image;

    loop {
        let next = (width > 1 || height > 1).then(|| {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            image::imageops::resize(&current, width, height, FilterType::Triangle)
        });
        levels.push(current.into_raw());
        match next {
            Some(image) => current = image,
            None => break,
        }
    }
    levels
}
