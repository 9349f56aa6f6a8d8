//! wgpu Device Tests
//!
//! Runs effect chains on a real headless `WgpuDevice` and submits the
//! recorded work:
//! - Buffer slots resized within one frame
//! - Uniform slots of passes without a uniform block
//! - Every built-in effect compiled and drawn
//!
//! Each test returns early when no adapter is available. wgpu's default
//! error handler panics on validation errors, so a test that reaches its
//! end has submitted cleanly.

use std::sync::Arc;

use glam::{UVec2, Vec2};
use myth_effects::{
    AllocateBuffer, Command, Effect, EffectChain, EffectServices, EffectSystem, GraphicsDevice,
    ImageBufferManager, ShaderLibrary, TextureHandle, WgpuDevice,
};

fn gpu_device() -> Option<WgpuDevice> {
    match pollster::block_on(WgpuDevice::headless()) {
        Ok(device) => Some(device),
        Err(err) => {
            eprintln!("skipping: no wgpu adapter ({err})");
            None
        }
    }
}

fn passthrough(name: &str) -> Effect {
    Effect::new(name).with_commands([
        Command::bind_shader("passthrough", 0),
        Command::bind_target(),
        Command::Render,
    ])
}

struct GpuRun {
    device: WgpuDevice,
    library: ShaderLibrary,
    images: ImageBufferManager,
    system: EffectSystem,
}

impl GpuRun {
    fn new(device: WgpuDevice, library: ShaderLibrary) -> Self {
        Self {
            device,
            library,
            images: ImageBufferManager::new(),
            system: EffectSystem::new(),
        }
    }

    /// Runs one frame of `chain` and waits for the submission to finish.
    fn frame(
        &mut self,
        size: UVec2,
        chain: &Arc<EffectChain>,
        input: TextureHandle,
        depth: Option<TextureHandle>,
    ) -> TextureHandle {
        self.system.setup(&mut self.device, size, Some(chain.clone()));
        let mut services = EffectServices {
            device: &mut self.device,
            shaders: &self.library,
            images: &mut self.images,
        };
        let output = self
            .system
            .process(&mut services, input, depth, Vec2::new(0.1, 100.0));
        self.device.submit();
        let _ = self.device.device().poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        output
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<UVec2> {
        self.device
            .texture(texture)
            .map(|t| UVec2::new(t.width(), t.height()))
    }

    fn release(&mut self) {
        self.system.release_resources(&mut self.device);
        self.images.release(&mut self.device);
    }
}

#[test]
fn free_slot_of_another_size_is_resized_within_the_frame() {
    let Some(mut device) = gpu_device() else {
        return;
    };
    let size = UVec2::new(64, 64);
    let scene = device
        .create_texture("Scene Color", size, wgpu::TextureFormat::Rgba8Unorm)
        .unwrap();

    // The third effect's half-size buffer takes over `__output_0`, which the
    // first effect drew into earlier in the same encoder.
    let half = Effect::new("Half").with_commands([
        Command::AllocateBuffer(AllocateBuffer::new("half").with_size_multiplier(0.5)),
        Command::bind_shader("passthrough", 0),
        Command::bind_buffer("half"),
        Command::Render,
        Command::apply_buffer(Some("half"), None),
        Command::bind_shader("passthrough", 1),
        Command::bind_target(),
        Command::Render,
    ]);
    let chain = Arc::new(
        EffectChain::new()
            .with(passthrough("First"))
            .with(passthrough("Second"))
            .with(half),
    );

    let mut run = GpuRun::new(device, ShaderLibrary::new());
    for _ in 0..2 {
        let output = run.frame(size, &chain, scene, None);
        assert_eq!(run.texture_size(output), Some(size));
    }
    assert!(
        run.system
            .buffers()
            .any(|b| b.size == UVec2::new(32, 32))
    );

    run.release();
    run.device.destroy_texture(scene);
}

const PLAIN_VERTEX: &str = "
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = effect_texture_map_uv(uv);
    return out;
}
";

const PLAIN_FRAGMENT: &str = "
@group(0) @binding(1) var input_texture: texture_2d<f32>;
@group(0) @binding(2) var input_texture_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(input_texture, input_texture_sampler, uv);
}
";

#[test]
fn pass_without_uniform_block_before_one_with_a_block() {
    let Some(mut device) = gpu_device() else {
        return;
    };
    let size = UVec2::new(16, 16);
    let scene = device
        .create_texture("Scene Color", size, wgpu::TextureFormat::Rgba8Unorm)
        .unwrap();

    let mut library = ShaderLibrary::new();
    library.register("plain_copy", PLAIN_VERTEX, PLAIN_FRAGMENT);

    let plain = Effect::new("Plain").with_commands([
        Command::bind_shader("plain_copy", 0),
        Command::bind_target(),
        Command::Render,
    ]);
    let blur = Effect::new("Blur").with_commands([
        Command::bind_shader("blur_horizontal", 0),
        Command::bind_target(),
        Command::Render,
    ]);
    let chain = Arc::new(EffectChain::new().with(plain).with(blur));

    let mut run = GpuRun::new(device, library);
    for _ in 0..2 {
        let output = run.frame(size, &chain, scene, None);
        assert_eq!(run.texture_size(output), Some(size));
    }
    assert_eq!(run.system.pipeline_count(), 2);

    run.release();
    run.device.destroy_texture(scene);
}

#[test]
fn every_builtin_effect_compiles_and_draws() {
    let Some(mut device) = gpu_device() else {
        return;
    };
    let size = UVec2::new(32, 32);
    let scene = device
        .create_texture("Scene Color", size, wgpu::TextureFormat::Rgba8Unorm)
        .unwrap();
    let depth = device.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Depth"),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth = device.import_texture(depth, "Scene Depth");

    let mut run = GpuRun::new(device, ShaderLibrary::new());
    for key in ShaderLibrary::builtin_keys() {
        let effect = Effect::new(key.clone()).with_commands([
            Command::bind_shader(key.clone(), 0),
            Command::apply_depth("depth_texture"),
            Command::bind_target(),
            Command::Render,
        ]);
        let chain = Arc::new(EffectChain::new().with(effect));

        let output = run.frame(size, &chain, scene, Some(depth));
        assert_ne!(output, scene, "built-in '{key}' produced no output");
        assert_eq!(run.system.pipeline_count(), 1, "built-in '{key}' failed to compile");
    }

    run.release();
    run.device.destroy_texture(scene);
    run.device.forget_texture(depth);
}
