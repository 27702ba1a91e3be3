#![allow(clippy::cast_precision_loss)]
//! Renders a small analytic scene with ambient obscurance and saves PNGs.
//!
//! Run with: cargo run --example obscurance_demo [-- <output dir>]
//!
//! Writes software-rendered images for each noise filter, the raw
//! occlusion mask, and the GPU result when an adapter is available.

use std::path::{Path, PathBuf};

use obscurance_core::reconstruct::encode_depth_normal;
use obscurance_core::surface::quantize_unorm8;
use obscurance_core::{
    estimate_occlusion, ColorSurface, DepthNormalSource, DepthNormalSurface, EffectParameters,
    FrameSettings, MaskSurface, NoiseFilter, PackedDepthNormals, Projection, SampleCount,
    SoftwareRenderer, Surface, Vec2, Vec3, Vec4,
};
use obscurance_render::upload::{color_texture, depth_normal_texture, target_texture};
use obscurance_render::{
    color_surface_to_rgba8, read_rgba8, save_image, save_mask, DepthNormalInput, FrameTargets,
    HeadlessDevice, ObscuranceRenderer, RendererConfig,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FAR: f32 = 40.0;
const OUT_DIR: &str = "target/obscurance";

// ─── Scene ──────────────────────────────────────────────────────────────────

fn projection() -> Projection {
    Projection::perspective(1.0, WIDTH as f32 / HEIGHT as f32, 0.1, FAR)
}

/// Back wall, floor and a sphere resting on the floor near the wall.
fn trace(dir: Vec3) -> (f32, Vec3) {
    let mut hit = (8.0, Vec3::NEG_Z);

    if dir.y > 0.0 {
        let t = 1.5 / dir.y;
        if t < hit.0 {
            hit = (t, Vec3::NEG_Y);
        }
    }

    let center = Vec3::new(0.4, 0.8, 6.5);
    let radius = 0.7;
    let b = dir.dot(center);
    let c = center.length_squared() - radius * radius;
    let disc = b * b - dir.length_squared() * c;
    if disc > 0.0 {
        let t = (b - disc.sqrt()) / dir.length_squared();
        if t > 0.0 && t < hit.0 {
            hit = (t, (dir * t - center).normalize());
        }
    }
    hit
}

fn scene() -> DepthNormalSurface {
    let proj = projection();
    Surface::from_fn(WIDTH, HEIGHT, |uv| {
        let (depth, normal) = trace(proj.view_position(uv, 1.0));
        encode_depth_normal(normal, depth / FAR)
    })
}

fn shaded_color(uv: Vec2) -> Vec4 {
    let base = Vec3::new(0.85, 0.82, 0.78);
    let tint = 0.9 + 0.1 * uv.y;
    (base * tint).extend(1.0)
}

// ─── Output ─────────────────────────────────────────────────────────────────

fn save(dir: &Path, name: &str, surface: &ColorSurface) {
    let path = dir.join(name);
    match save_image(&path, &color_surface_to_rgba8(surface), WIDTH, HEIGHT) {
        Ok(()) => println!("  wrote {}", path.display()),
        Err(e) => eprintln!("  failed to write {}: {e}", path.display()),
    }
}

fn render_software(dir: &Path, depth_normals: &DepthNormalSurface, color: &ColorSurface) {
    let source = PackedDepthNormals::new(depth_normals, FAR);
    let mut renderer = SoftwareRenderer::new();

    for (name, filter) in [
        ("none", NoiseFilter::None),
        ("narrow", NoiseFilter::Narrow),
        ("wide", NoiseFilter::Wide),
    ] {
        let params = EffectParameters::new()
            .with_radius(0.6)
            .with_intensity(1.5)
            .with_noise_filter(filter);
        let mut out = ColorSurface::new(WIDTH, HEIGHT, Vec4::ZERO);

        match renderer.render(&params, projection(), 0.0, color, &source, &mut out) {
            Ok(report) => println!(
                "software, filter {name}: {} passes, {} scratch surfaces",
                report.passes, report.scratch_acquired
            ),
            Err(e) => {
                eprintln!("software render failed: {e}");
                continue;
            }
        }
        save(dir, &format!("software_{name}.png"), &out);
    }

    // unfiltered estimate at the default variable sample count
    let params = EffectParameters::new()
        .with_radius(0.6)
        .with_intensity(1.5)
        .with_sample_count(SampleCount::DEFAULT_VARIABLE);
    let settings = FrameSettings::resolve(
        &params,
        projection(),
        source.kind(),
        0.0,
        WIDTH,
        HEIGHT,
    );
    let mask: MaskSurface = Surface::from_fn(WIDTH, HEIGHT, |uv| {
        quantize_unorm8(estimate_occlusion(&source, uv, &settings))
    });
    let path = dir.join("software_raw_mask.png");
    match save_mask(&path, &mask) {
        Ok(()) => println!("  wrote {}", path.display()),
        Err(e) => eprintln!("  failed to write {}: {e}", path.display()),
    }
}

fn render_gpu(dir: &Path, depth_normals: &DepthNormalSurface, color: &ColorSurface) {
    let gpu = match HeadlessDevice::new() {
        Ok(gpu) => gpu,
        Err(e) => {
            println!("skipping GPU render: {e}");
            return;
        }
    };
    println!("GPU adapter: {}", gpu.adapter_info.name);

    let params = EffectParameters::new()
        .with_radius(0.6)
        .with_intensity(1.5)
        .with_noise_filter(NoiseFilter::Wide)
        .with_downsampling(true);

    let mut renderer = match ObscuranceRenderer::acquire(
        &gpu.device,
        RendererConfig::default(),
        &params,
        WIDTH,
        HEIGHT,
    ) {
        Ok(renderer) => renderer,
        Err(e) => {
            eprintln!("failed to set up the GPU effect: {e}");
            return;
        }
    };

    let color_tex = color_texture(&gpu.device, &gpu.queue, color);
    let target = target_texture(&gpu.device, &gpu.queue, color);
    let depth_normal_tex = depth_normal_texture(&gpu.device, &gpu.queue, depth_normals);
    let default_view = wgpu::TextureViewDescriptor::default();
    let color_view = color_tex.create_view(&default_view);
    let target_view = target.create_view(&default_view);
    let depth_normal_view = depth_normal_tex.create_view(&default_view);

    let result = renderer
        .render(
            &gpu.device,
            &gpu.queue,
            &params,
            projection(),
            0.0,
            DepthNormalInput::Packed(&depth_normal_view),
            FrameTargets {
                source: Some(&color_view),
                destination: &target_view,
                width: WIDTH,
                height: HEIGHT,
            },
        )
        .and_then(|report| {
            println!(
                "gpu: {} passes, {} scratch textures",
                report.passes, report.scratch_acquired
            );
            read_rgba8(&gpu.device, &gpu.queue, &target)
        });

    match result {
        Ok(pixels) => {
            let path = dir.join("gpu_wide.png");
            match save_image(&path, &pixels, WIDTH, HEIGHT) {
                Ok(()) => println!("  wrote {}", path.display()),
                Err(e) => eprintln!("  failed to write {}: {e}", path.display()),
            }
        }
        Err(e) => eprintln!("GPU render failed: {e}"),
    }
    renderer.release();
}

fn main() {
    env_logger::init();

    let dir: PathBuf = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(OUT_DIR), PathBuf::from);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create {}: {e}", dir.display());
        return;
    }

    let depth_normals = scene();
    let color = Surface::from_fn(WIDTH, HEIGHT, shaded_color);

    render_software(&dir, &depth_normals, &color);
    render_gpu(&dir, &depth_normals, &color);
}
