//! Winit application harness.
//!
//! A minimal walkabout host around the renderer: it owns the window,
//! polls input into a [`CameraPose`], drives the world's load/save, and
//! calls `render_frame` every redraw. The renderer itself never touches
//! the event loop; it only sees raw window handles and per-frame input.

use std::path::PathBuf;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::camera::{CameraPose, camera_forward};
use crate::errors::Result;
use crate::renderer::{FrameInput, Renderer};
use crate::sim::SimulationFrame;
use crate::world::World;
use glam::Vec3;

const WORLD_FILE: &str = "world.bin";
const MOVE_SPEED: f32 = 18.0;
const LOOK_SPEED_DEGREES: f32 = 90.0;

#[derive(Default)]
struct InputState {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    look_left: bool,
    look_right: bool,
    look_up: bool,
    look_down: bool,
}

/// The walkabout application.
pub struct App {
    renderer: Renderer,
    world: World,
    camera: CameraPose,
    input: InputState,
    window: Option<Arc<Window>>,
    last_update: Option<std::time::Instant>,
    world_path: PathBuf,
}

impl App {
    #[must_use]
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            world: World::new(),
            camera: CameraPose::default(),
            input: InputState::default(),
            window: None,
            last_update: None,
            world_path: PathBuf::from(WORLD_FILE),
        }
    }

    /// Runs the event loop until the window closes.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let pressed = event.state == ElementState::Pressed;
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match code {
            KeyCode::KeyW => self.input.forward = pressed,
            KeyCode::KeyS => self.input.back = pressed,
            KeyCode::KeyA => self.input.left = pressed,
            KeyCode::KeyD => self.input.right = pressed,
            KeyCode::Space => self.input.up = pressed,
            KeyCode::ShiftLeft => self.input.down = pressed,
            KeyCode::ArrowLeft => self.input.look_left = pressed,
            KeyCode::ArrowRight => self.input.look_right = pressed,
            KeyCode::ArrowUp => self.input.look_up = pressed,
            KeyCode::ArrowDown => self.input.look_down = pressed,
            KeyCode::F1 if pressed => {
                let visible = !self.renderer.is_debug_ui_visible();
                self.renderer.set_debug_ui_visible(visible);
            }
            KeyCode::F2 if pressed => {
                let visible = !self.renderer.is_frame_stats_visible();
                self.renderer.set_frame_stats_visible(visible);
            }
            _ => {}
        }
    }

    fn update_camera(&mut self, dt: f32) {
        let forward = camera_forward(self.camera.yaw_degrees, self.camera.pitch_degrees);
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let mut movement = Vec3::ZERO;
        if self.input.forward {
            movement += forward;
        }
        if self.input.back {
            movement -= forward;
        }
        if self.input.right {
            movement += right;
        }
        if self.input.left {
            movement -= right;
        }
        if self.input.up {
            movement += Vec3::Y;
        }
        if self.input.down {
            movement -= Vec3::Y;
        }
        self.camera.position += movement.normalize_or_zero() * MOVE_SPEED * dt;

        if self.input.look_left {
            self.camera.yaw_degrees -= LOOK_SPEED_DEGREES * dt;
        }
        if self.input.look_right {
            self.camera.yaw_degrees += LOOK_SPEED_DEGREES * dt;
        }
        if self.input.look_up {
            self.camera.pitch_degrees += LOOK_SPEED_DEGREES * dt;
        }
        if self.input.look_down {
            self.camera.pitch_degrees -= LOOK_SPEED_DEGREES * dt;
        }
        self.camera.pitch_degrees = self.camera.pitch_degrees.clamp(-89.0, 89.0);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match event_loop.create_window(
            Window::default_attributes().with_title("verdant walkabout"),
        ) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("window creation failed: {err}");
                event_loop.exit();
                return;
            }
        };

        let result = self.world.load_or_initialize(&self.world_path);
        log::info!(
            "world ready (loaded={}, regenerated={})",
            result.loaded_from_file,
            result.initialized_fallback
        );

        let size = window.inner_size();
        if let Err(err) = pollster::block_on(self.renderer.init(
            window.clone(),
            size.width,
            size.height,
        )) {
            log::error!("renderer init failed: {err}");
            event_loop.exit();
            return;
        }
        self.renderer.update_chunk_meshes();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Err(err) = self.world.save(&self.world_path) {
                    log::warn!("world save failed: {err}");
                }
                self.renderer.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                let dt = self
                    .last_update
                    .map_or(1.0 / 60.0, |last| last.elapsed().as_secs_f32())
                    .min(0.1);
                self.last_update = Some(now);
                self.update_camera(dt);

                self.renderer.begin_ui_frame();
                let input = FrameInput {
                    camera: self.camera,
                    world: &self.world,
                    simulation: SimulationFrame::default(),
                    preview: crate::renderer::instances::VoxelPreview::default(),
                };
                if !self.renderer.render_frame(&input) {
                    log::error!("fatal render error, exiting");
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Library entry the binary-less demo uses: builds a renderer with
/// default settings and runs the walkabout app.
pub fn run_walkabout() -> Result<()> {
    env_logger::init();
    let renderer = Renderer::new(crate::renderer::settings::RenderSettings::default());
    App::new(renderer).run()
}
