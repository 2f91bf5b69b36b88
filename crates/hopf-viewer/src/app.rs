use crate::{
    camera::{Camera, CameraState},
    camera_updater::{CameraUpdater, CursorCapture},
    config::Config,
    gpu::{GpuError, WgpuBackend},
    input::{look_delta, MoveKeys},
    renderer::{context::GfxContext, pipelines::SceneLayouts, Renderer},
    sim::Simulation,
    ui::{self, PanelStats},
    viewport::Viewport,
    views::{FiberView, FrameTarget, SphereView, ViewContext},
};
use anyhow::Result;
use glam::{IVec2, UVec2, Vec2, Vec3};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{DeviceEvent, ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// Frames longer than this are treated as a stall and not simulated.
const MAX_FRAME_DT: f32 = 0.25;
const PANEL_MARGIN: f32 = 8.0;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

pub struct App {
    window: Arc<Window>,
    cursor: Arc<dyn CursorCapture>,
    config: Config,
    pub renderer: Renderer,
    backend: WgpuBackend,
    sim: Simulation<WgpuBackend>,
    fibers: Viewport<WgpuBackend>,
    sphere: Viewport<WgpuBackend>,
    updater: CameraUpdater,
    keys: MoveKeys,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    last_frame: Instant,
    frame_time: f32,
}

impl App {
    pub async fn new(window: Arc<Window>, config: Config) -> Result<Self> {
        let gfx = GfxContext::new(window.clone()).await?;
        let backend = WgpuBackend::new(gfx.device.clone(), gfx.queue.clone());
        let size = gfx.size;

        let sim = Simulation::new(&backend, config.simulation_params(), config.seed)?;
        let renderer = {
            let layouts = SceneLayouts {
                sphere: sim.points().sphere().vertex_layout(wgpu::VertexStepMode::Vertex),
                tube: sim.fibration().tube().vertex_layout(wgpu::VertexStepMode::Vertex),
                lines: sim.fibration().lines().vertex_layout(wgpu::VertexStepMode::Vertex),
            };
            Renderer::new(gfx, &layouts)
        };

        let dims = (size.width.max(1), size.height.max(1));
        let panel = Self::panel_px(&window, &config);
        let main_camera = CameraState::new(
            Vec3::splat(-1.0),
            Vec3::splat(5.0),
            dims,
            config.fov(),
            config.near,
            config.far,
        );
        let fibers = Viewport::new(
            "Hopf Fibration",
            Camera::new(&backend, main_camera),
            IVec2::ZERO,
            UVec2::new(dims.0.saturating_sub(panel).max(1), dims.1),
        );

        let s2_camera = CameraState::new(
            Vec3::X,
            Vec3::new(-2.0, 0.0, 0.0),
            (panel, panel),
            config.fov(),
            config.near,
            config.far,
        );
        let sphere = Viewport::new(
            "S2",
            Camera::new(&backend, s2_camera),
            IVec2::ZERO,
            UVec2::splat(panel),
        )
        .with_fixed_size(UVec2::splat(panel))
        .with_fixed_pos(Self::sphere_anchor(dims, panel));

        let updater = CameraUpdater::spawn(config.updater_settings())?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        log::info!(
            "{} fibers at resolution {}, {}x{} window",
            config.fibers,
            config.resolution,
            dims.0,
            dims.1
        );

        let cursor: Arc<dyn CursorCapture> = window.clone();
        Ok(Self {
            window,
            cursor,
            config,
            renderer,
            backend,
            sim,
            fibers,
            sphere,
            updater,
            keys: MoveKeys::default(),
            egui_ctx,
            egui_state,
            last_frame: Instant::now(),
            frame_time: 0.0,
        })
    }

    /// Panel width in physical pixels.
    fn panel_px(window: &Window, config: &Config) -> u32 {
        (config.panel_width as f64 * window.scale_factor()).round() as u32
    }

    /// Bottom-right corner, under the parameter panel.
    fn sphere_anchor(dims: (u32, u32), panel: u32) -> IVec2 {
        IVec2::new(
            dims.0.saturating_sub(panel) as i32,
            dims.1.saturating_sub(panel) as i32,
        )
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            let panel = Self::panel_px(&self.window, &self.config);
            self.sphere
                .pin_to(Self::sphere_anchor((new_size.width, new_size.height), panel));
        }
    }

    fn release_camera(&mut self) {
        self.updater.set_data(None, None, Vec2::ZERO);
        self.keys.clear();
    }

    /// Returns `true` when the event was consumed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        if self.updater.is_attached() {
            match event {
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        let pressed = event.state == ElementState::Pressed;
                        if code == KeyCode::Escape {
                            if pressed {
                                self.release_camera();
                            }
                            return true;
                        }
                        if self.keys.handle_key(code, pressed) {
                            self.updater.set_direction(self.keys.direction());
                            return true;
                        }
                    }
                }
                WindowEvent::Focused(false) => self.release_camera(),
                _ => {}
            }
        }

        let response = self.egui_state.on_window_event(&self.window, event);
        if response.consumed {
            return true;
        }

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.updater.is_attached() {
                let look = look_delta(*delta, self.config.mouse_sensitivity);
                self.updater.queue_look(look.x, look.y);
            }
        }
    }

    pub fn render(&mut self) -> Result<(), FrameError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_time = self.frame_time * 0.9 + dt * 0.1;

        // UI first: it decides layout, focus and the parameters of this frame.
        let egui_input = self.egui_state.take_egui_input(&self.window);
        self.egui_ctx.begin_frame(egui_input);

        let mut params = self.sim.params().clone();
        let stats = PanelStats {
            frame_time: self.frame_time,
            tube_vertices: self.sim.fibration().tube().vertex_count(),
            camera_attached: self.updater.is_attached(),
            max_fibers: self.sim.max_fibers(),
        };
        let screen = self.egui_ctx.screen_rect();
        let panel_width = self.config.panel_width as f32;
        let panel_pos = egui::pos2(screen.max.x - panel_width - PANEL_MARGIN, PANEL_MARGIN);
        let changed = ui::draw_params_panel(&self.egui_ctx, &mut params, stats, panel_pos, panel_width);

        let fibers_clicked = self.fibers.show(&self.egui_ctx);
        let sphere_clicked = self.sphere.show(&self.egui_ctx);

        let mut egui_output = self.egui_ctx.end_frame();
        let platform_output = std::mem::take(&mut egui_output.platform_output);
        self.egui_state
            .handle_platform_output(&self.window, platform_output);

        if fibers_clicked || sphere_clicked {
            let mut ctx = ViewContext {
                pipelines: &self.renderer.scene,
                sim: &self.sim,
                updater: &self.updater,
                cursor: &self.cursor,
                frame: None,
            };
            if fibers_clicked {
                self.fibers.focus(&mut FiberView(&mut ctx));
            } else {
                self.sphere.focus(&mut SphereView(&mut ctx));
            }
        }

        if changed {
            self.sim.apply_params(&self.backend, params);
        }
        self.sim.update(&self.backend, dt.min(MAX_FRAME_DT))?;

        let device = &self.renderer.gfx.device;
        self.renderer
            .scene
            .prepare_camera(device, self.fibers.camera().bind_ubo());
        self.renderer
            .scene
            .prepare_camera(device, self.sphere.camera().bind_ubo());

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.renderer.clear(&mut encoder, &swap_view);

        {
            let target = FrameTarget {
                encoder: &mut encoder,
                color: &swap_view,
                depth: &self.renderer.targets.depth,
                width: self.renderer.gfx.config.width,
                height: self.renderer.gfx.config.height,
            };
            let mut ctx = ViewContext {
                pipelines: &self.renderer.scene,
                sim: &self.sim,
                updater: &self.updater,
                cursor: &self.cursor,
                frame: Some(target),
            };
            self.fibers
                .render(&self.backend, &mut FiberView(&mut ctx))?;
            self.sphere
                .render(&self.backend, &mut SphereView(&mut ctx))?;
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        self.sim.after_render(&self.backend)?;

        self.renderer
            .render_ui(&swap_view, &self.egui_ctx, egui_output);
        frame.present();

        Ok(())
    }
}
