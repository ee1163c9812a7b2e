//! Cadence demo: a handful of shaded cubes driven through the frame
//! orchestrator.
//!
//! Configuration comes from `CADENCE_*` environment variables (see
//! [`RendererConfig::from_env`]). Set `CADENCE_SCENE` to a JSON scene file to
//! replace the built-in layout; its entries may name the built-in `cube` or an
//! OBJ mesh file.

mod geometry;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec3;
use tracing::{error, info};

use cadence_core::{FrameTimer, RendererConfig, init_logging};
use cadence_platform::{SurfaceProvider, Window};
use cadence_renderer::{
    FrameContext, FrameOrchestrator, GlobalUbo, GlobalUniforms, Mesh, RenderSystem,
};
use cadence_rhi::{GraphicsBackend, GraphicsPipelineDesc, VulkanBackend};
use cadence_scene::{Camera, Entity, EntityFactory, GeometryCache, SceneFile, Transform};

type Backend = VulkanBackend;

/// Direction towards the light in world space.
const LIGHT_DIRECTION: Vec3 = Vec3::new(1.0, 3.0, 2.0);

/// Radians per second the demo cubes spin around Y.
const SPIN_SPEED: f32 = 0.6;

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = RendererConfig::from_env()?;
    info!("Starting with {:?}", config);

    // The window outlives everything below, since the backend's surface is created from it.
    let mut window = Window::new(config.width, config.height, &config.title)?;
    let extensions = window.required_extensions()?;
    let backend = Arc::new(VulkanBackend::new(
        c"Cadence",
        config.enable_validation,
        &extensions,
        |entry, instance| window.create_surface(entry, instance),
    )?);

    let mut frames = FrameOrchestrator::new(backend.clone(), &mut window, &config)?;
    let uniforms = GlobalUniforms::new(backend.clone(), config.frames_in_flight)?;
    let pipeline_desc = GraphicsPipelineDesc::new(
        config.shader_dir.join("default.vert.spv"),
        config.shader_dir.join("default.frag.spv"),
    );
    let render_system =
        RenderSystem::new(backend.clone(), frames.chain(), uniforms.layout(), &pipeline_desc)?;

    let mut geometry = GeometryCache::new();
    let (vertices, indices) = geometry::cube();
    geometry.insert("cube", Mesh::new(backend.clone(), &vertices, &indices)?);

    let mut factory = EntityFactory::new();
    let mut entities = match &config.scene_file {
        Some(path) => SceneFile::load(path)
            .and_then(|scene| {
                scene.spawn(&mut factory, &mut geometry, |mesh| {
                    Mesh::from_file(backend.clone(), mesh)
                })
            })
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => demo_scene(&mut factory, &geometry),
    };
    info!("Scene ready: {} entities", entities.len());

    let mut camera = Camera::new();
    camera.set_view_target(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO);

    let mut timer = FrameTimer::new();
    while !window.should_close() {
        window.poll_events();
        let frame_time = timer.tick();

        for entity in &mut entities {
            entity.transform.rotation.y += SPIN_SPEED * frame_time;
        }
        camera.set_perspective(50f32.to_radians(), frames.aspect_ratio(), 0.1, 100.0);

        let Some(cmd) = frames.begin_frame(&mut window)? else {
            continue;
        };

        let frame_index = frames.frame_index();
        uniforms.update(
            frame_index,
            &GlobalUbo::new(camera.projection_view(), LIGHT_DIRECTION),
        )?;
        let frame = FrameContext {
            frame_index,
            frame_time,
            command_buffer: cmd,
            camera: &camera,
            global_set: uniforms.set(frame_index),
        };

        frames.begin_render_pass(cmd);
        render_system.render(&frame, &entities);
        frames.end_render_pass(cmd);
        frames.end_frame(&mut window)?;
    }

    backend.wait_idle()?;
    info!(
        "Rendered {} frames in {:.1}s",
        timer.frame_count(),
        timer.elapsed().as_secs_f32()
    );
    Ok(())
}

/// A ring of tinted cubes of varying size around an empty marker entity.
fn demo_scene(
    factory: &mut EntityFactory,
    geometry: &GeometryCache<Mesh<Backend>>,
) -> Vec<Entity<Mesh<Backend>>> {
    let mut entities = vec![factory.create()];

    let Some(cube) = geometry.get("cube") else {
        return entities;
    };

    const COUNT: usize = 6;
    for i in 0..COUNT {
        let angle = i as f32 / COUNT as f32 * std::f32::consts::TAU;
        let scale = 0.4 + 0.1 * i as f32;
        let transform = Transform::default()
            .with_translation(Vec3::new(angle.cos() * 2.0, 0.0, angle.sin() * 2.0))
            .with_scale(Vec3::splat(scale))
            .with_rotation(Vec3::new(0.3 * i as f32, angle, 0.0));
        let tint = Vec3::new(1.0, 0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin());
        entities.push(
            factory
                .create()
                .with_geometry(cube.clone())
                .with_color(tint)
                .with_transform(transform),
        );
    }
    entities.push(
        factory
            .create()
            .with_geometry(cube)
            .with_transform(Transform::default().with_scale(Vec3::new(1.0, 0.25, 1.0))),
    );

    entities
}
