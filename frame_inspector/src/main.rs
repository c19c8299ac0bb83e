//! Frame inspector
//!
//! Runs the render graph against the headless device and prints what a frame
//! records: the pass sequence, per-frame statistics and the texture the final
//! pass presents. Settings files are optional:
//!
//! ```text
//! frame_inspector [--graph render.toml] [--scene scene.ron] [--frames N]
//! ```

use frame_graph::prelude::*;
use frame_graph::rhi::headless::RecordedCommand;
use frame_graph::scene::SpriteInstance;
use std::f32::consts::FRAC_PI_3;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const DEFAULT_FRAMES: u32 = 3;

#[derive(Debug, thiserror::Error)]
enum InspectorError {
    #[error(transparent)]
    Graph(#[from] FrameGraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid arguments: {0}")]
    Arguments(String),
}

#[derive(Debug, Default)]
struct Options {
    graph_settings: Option<String>,
    scene_settings: Option<String>,
    frames: Option<u32>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, InspectorError> {
        let mut options = Self::default();
        while let Some(arg) = args.next() {
            let mut value = || args.next().ok_or_else(|| InspectorError::Arguments(format!("{arg} needs a value")));
            match arg.as_str() {
                "--graph" => options.graph_settings = Some(value()?),
                "--scene" => options.scene_settings = Some(value()?),
                "--frames" => {
                    let frames = value()?;
                    options.frames =
                        Some(frames.parse().map_err(|_| InspectorError::Arguments(format!("bad frame count {frames}")))?);
                }
                other => return Err(InspectorError::Arguments(format!("unknown argument {other}"))),
            }
        }
        Ok(options)
    }
}

struct Inspector {
    device: HeadlessDevice,
    passes: RenderPasses,
    scene: Scene,
}

impl Inspector {
    fn new(options: &Options) -> Result<Self, InspectorError> {
        let settings = match &options.graph_settings {
            Some(path) => {
                log::info!("Loading graph settings from {path}");
                RenderPassesSettings::load_from_file(path)?
            }
            None => RenderPassesSettings::default(),
        };

        let mut device = HeadlessDevice::with_standard_shaders(DeviceCapabilities::default(), WIDTH, HEIGHT);
        let mut passes = RenderPasses::new(&mut device, settings, WIDTH, HEIGHT)?;
        passes.enable_debug_renderer(&mut device, true);

        let mut scene = demo_scene(&mut device)?;
        if let Some(path) = &options.scene_settings {
            log::info!("Loading scene settings from {path}");
            scene.settings = SceneRenderSettings::load_from_file(path)?;
        }
        scene.environment = passes.create_cube_map(&mut device, None, Vec4::new(0.0, 0.0, 0.0, 1.0))?;

        Ok(Self { device, passes, scene })
    }

    fn run(&mut self, frames: u32) -> Result<(), InspectorError> {
        for frame in 0..frames {
            self.device.clear_commands();
            self.scene.elapsed = frame as f32 / 60.0;
            self.scene.debug.clear();
            for mesh in &self.scene.meshes {
                let bounds = mesh.bounds.transformed(&mesh.transform);
                self.scene.debug.draw_box(&bounds, Vec4::new(0.2, 1.0, 0.2, 1.0), true);
            }

            self.passes.begin_scene(&mut self.device, &self.scene)?;
            self.passes.on_render(&mut self.device, &self.scene)?;
            self.report(frame);
            self.device.next_frame();
        }
        Ok(())
    }

    fn report(&self, frame: u32) {
        let stats = self.passes.stats();
        log::info!(
            "Frame {frame}: {} objects, {} shadow casters, {} draw calls",
            stats.num_rendered_objects,
            stats.num_shadow_objects,
            stats.num_draw_calls
        );

        let mut sequence: Vec<&str> = Vec::new();
        for name in self.device.bound_pipeline_names() {
            if sequence.last() != Some(&name) {
                sequence.push(name);
            }
        }
        log::info!("Passes: {}", sequence.join(" > "));

        let clears = self.device.commands().iter().filter(|c| matches!(c, RecordedCommand::Clear { .. })).count();
        log::debug!("{clears} clears, {} device draws", self.device.draw_call_count());

        if let Some(chain) = self.passes.post_process_chain() {
            let presented = if self.passes.last_render_target() == self.passes.targets().main { "main" } else { "post process" };
            log::info!("Post chain swapped {} times, presenting the {presented} target", chain.swap_count());
        }
    }

    fn shutdown(&mut self) {
        self.passes.destroy(&mut self.device);
    }
}

fn demo_scene(device: &mut HeadlessDevice) -> Result<Scene, InspectorError> {
    let camera = Camera { aspect: WIDTH as f32 / HEIGHT as f32, ..Camera::default() };
    let eye = Transform::from_position(Vec3::new(0.0, 3.0, 14.0));
    let sun = Transform::from_position_rotation(
        Vec3::new(0.0, 30.0, 0.0),
        frame_graph::foundation::math::Quat::from_axis_angle(&Vec3::x_axis(), -FRAC_PI_3),
    );

    let mut scene = Scene::new()
        .with_camera(CameraView::new(camera, eye.to_matrix()))
        .with_light(Light::directional(Vec4::new(1.0, 0.95, 0.9, 1.0), 4.0), sun)
        .with_light(Light::point(Vec4::new(0.3, 0.5, 1.0, 1.0), 2.0, 4.0), Transform::from_position(Vec3::new(3.0, 1.0, 2.0)));

    let glass = std::sync::Arc::new(Material::new("glass", MaterialFlags::DEPTH_TEST | MaterialFlags::ALPHA_BLEND));
    for (i, x) in (-3..=3).enumerate() {
        let transform = Mat4::new_translation(&Vec3::new(x as f32 * 2.5, 0.0, 0.0));
        let material = (i % 3 == 0).then(|| glass.clone());
        scene = scene.with_mesh(MeshHandle(i as u64), BoundingBox::unit(), transform, material);
    }

    let atlas = device.create_texture(&frame_graph::rhi::TextureDesc::colour(
        "Sprite Atlas",
        frame_graph::rhi::TextureFormat::Rgba8,
        64,
        64,
    ))
    .map_err(FrameGraphError::from)?;
    for i in 0..4 {
        let sprite = Sprite { texture: (i % 2 == 0).then_some(atlas), ..Sprite::default() };
        let transform = Mat4::new_translation(&Vec3::new(i as f32 - 2.0, 4.0, 1.0 + i as f32 * 0.1));
        scene.sprites.push(SpriteInstance { sprite, transform, active: true });
    }

    scene.settings.ssao_enabled = true;
    scene.settings.debug_renderer_enabled = true;
    Ok(scene)
}

fn main() {
    frame_graph::foundation::logging::init();

    let result = Options::parse(std::env::args().skip(1)).and_then(|options| {
        let mut inspector = Inspector::new(&options)?;
        let outcome = inspector.run(options.frames.unwrap_or(DEFAULT_FRAMES));
        inspector.shutdown();
        outcome
    });

    if let Err(e) = result {
        log::error!("Frame inspector failed: {e}");
        std::process::exit(1);
    }
}
