//! Runs a two-effect blur chain over a generated gradient on a headless
//! device and prints what the effect system allocated.
//!
//! `RUST_LOG=myth_effects=trace cargo run --example effect_chain_demo`

use std::sync::Arc;

use glam::{UVec2, Vec2};
use myth_effects::{
    AllocateBuffer, Command, Effect, EffectChain, EffectServices, EffectSystem,
    ImageBufferManager, Property, ShaderLibrary, UniformValue, WgpuDevice,
};

const SIZE: UVec2 = UVec2::new(512, 512);

fn gradient(size: UVec2) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size.x * size.y * 4) as usize);
    for y in 0..size.y {
        for x in 0..size.x {
            let r = (x * 255 / size.x.max(1)) as u8;
            let g = (y * 255 / size.y.max(1)) as u8;
            let checker = if ((x / 32) + (y / 32)) % 2 == 0 { 255 } else { 0 };
            pixels.extend_from_slice(&[r, g, checker, 255]);
        }
    }
    pixels
}

fn scene_texture(device: &WgpuDevice) -> wgpu::Texture {
    let extent = wgpu::Extent3d {
        width: SIZE.x,
        height: SIZE.y,
        depth_or_array_layers: 1,
    };
    let texture = device.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Color"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    device.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &gradient(SIZE),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(SIZE.x * 4),
            rows_per_image: Some(SIZE.y),
        },
        extent,
    );
    texture
}

fn blur_chain() -> EffectChain {
    let vertical = Effect::new("GaussianBlurVertical")
        .with_property(Property::new("amount", UniformValue::Float(1.5)))
        .with_commands([
            Command::AllocateBuffer(AllocateBuffer::new("blur_half").with_size_multiplier(0.5)),
            Command::bind_shader("blur_vertical", 0),
            Command::apply_instance(None),
            Command::bind_buffer("blur_half"),
            Command::Render,
            Command::apply_buffer(Some("blur_half"), None),
            Command::bind_shader("passthrough", 1),
            Command::bind_target(),
            Command::Render,
        ]);

    let horizontal = Effect::new("GaussianBlurHorizontal")
        .with_property(Property::new("amount", UniformValue::Float(1.5)))
        .with_commands([
            Command::bind_shader("blur_horizontal", 0),
            Command::apply_instance(Some("amount")),
            Command::bind_target(),
            Command::Render,
        ]);

    EffectChain::new().with(vertical).with(horizontal)
}

fn main() -> myth_effects::Result<()> {
    env_logger::init();

    let mut device = pollster::block_on(WgpuDevice::headless())?;
    let scene = device.import_texture(scene_texture(&device), "Scene Color");

    let library = ShaderLibrary::new();
    let mut images = ImageBufferManager::new();
    let mut effects = EffectSystem::new();
    let chain = Arc::new(blur_chain());

    log::info!("Built-in effects: {:?}", ShaderLibrary::builtin_keys());

    for frame in 0..3 {
        effects.setup(&mut device, SIZE, Some(chain.clone()));
        let mut services = EffectServices {
            device: &mut device,
            shaders: &library,
            images: &mut images,
        };
        let output = effects.process(&mut services, scene, None, Vec2::new(0.1, 100.0));
        device.submit();

        let size = device.texture(output).map(wgpu::Texture::size);
        log::info!(
            "Frame {frame}: output {output:?} {size:?}, {} buffers, {} pipelines, {} shader modules",
            effects.buffer_count(),
            effects.pipeline_count(),
            device.module_count()
        );
    }

    for buffer in effects.buffers() {
        log::info!(
            "  buffer {:?} {} {:?} name={:?}",
            buffer.texture,
            buffer.size,
            buffer.format,
            buffer.name
        );
    }

    effects.release_resources(&mut device);
    images.release(&mut device);
    device.forget_texture(scene);
    Ok(())
}
