use crate::camera::Camera;
use crate::gpu::{GpuBackend, GpuError};
use glam::{IVec2, UVec2, Vec2};

/// Screen rectangle in physical pixels, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Part of the region inside a `width × height` target, if any.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Region> {
        let x0 = self.x.clamp(0, width as i32);
        let y0 = self.y.clamp(0, height as i32);
        let x1 = (self.x + self.width as i32).clamp(0, width as i32);
        let y1 = (self.y + self.height as i32).clamp(0, height as i32);
        (x1 > x0 && y1 > y0).then(|| Region {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// What a viewport shows and how it reacts to being focused.
pub trait ViewportContent<B: GpuBackend> {
    fn render(&mut self, region: Region, camera: &Camera<B>);

    fn on_focus(&mut self, viewport: &mut Viewport<B>);
}

/// A named window onto the scene with its own camera.
pub struct Viewport<B: GpuBackend> {
    name: String,
    pos: IVec2,
    size: UVec2,
    camera: Camera<B>,
    fixed_pos: Option<IVec2>,
    fixed_size: Option<UVec2>,
    collapsed: bool,
}

impl<B: GpuBackend> Viewport<B> {
    pub fn new(name: impl Into<String>, camera: Camera<B>, pos: IVec2, size: UVec2) -> Self {
        Self {
            name: name.into(),
            pos,
            size,
            camera,
            fixed_pos: None,
            fixed_size: None,
            collapsed: false,
        }
    }

    pub fn with_fixed_pos(mut self, pos: IVec2) -> Self {
        self.fixed_pos = Some(pos);
        self.pos = pos;
        self
    }

    pub fn with_fixed_size(mut self, size: UVec2) -> Self {
        self.fixed_size = Some(size);
        self.size = size;
        self
    }

    /// Moves a pinned viewport, e.g. after the window was resized.
    pub fn pin_to(&mut self, pos: IVec2) {
        self.fixed_pos = Some(pos);
        self.pos = pos;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera(&self) -> &Camera<B> {
        &self.camera
    }

    pub fn region(&self) -> Region {
        Region {
            x: self.pos.x,
            y: self.pos.y,
            width: self.size.x,
            height: self.size.y,
        }
    }

    /// Center in physical pixels, where the captured cursor is parked.
    pub fn center(&self) -> Vec2 {
        self.pos.as_vec2() + self.size.as_vec2() * 0.5
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    /// Moves and resizes the viewport, except where pinned.
    pub fn set_layout(&mut self, pos: IVec2, size: UVec2) {
        self.pos = self.fixed_pos.unwrap_or(pos);
        self.size = self.fixed_size.unwrap_or(size);
    }

    /// Draws the viewport's transparent egui window and records where it
    /// ended up. Returns `true` when the content area was clicked.
    pub fn show(&mut self, ctx: &egui::Context) -> bool {
        let ppp = ctx.pixels_per_point();
        let to_points = |v: IVec2| egui::pos2(v.x as f32 / ppp, v.y as f32 / ppp);

        let mut window = egui::Window::new(self.name.as_str())
            .frame(egui::Frame::window(&ctx.style()).fill(egui::Color32::TRANSPARENT))
            .collapsible(true);
        window = match self.fixed_pos {
            Some(pos) => window.fixed_pos(to_points(pos)),
            None => window.default_pos(to_points(self.pos)),
        };
        window = match self.fixed_size {
            Some(size) => window.fixed_size(egui::vec2(size.x as f32 / ppp, size.y as f32 / ppp)),
            None => window
                .resizable(true)
                .default_size(egui::vec2(self.size.x as f32 / ppp, self.size.y as f32 / ppp)),
        };

        let shown = window.show(ctx, |ui| {
            let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click());
            (rect, response.clicked())
        });

        match shown.and_then(|r| r.inner) {
            Some((rect, clicked)) => {
                self.collapsed = false;
                let pos = IVec2::new((rect.min.x * ppp).round() as i32, (rect.min.y * ppp).round() as i32);
                let size = UVec2::new(
                    (rect.width() * ppp).round().max(0.0) as u32,
                    (rect.height() * ppp).round().max(0.0) as u32,
                );
                self.pos = pos;
                self.size = size;
                clicked
            }
            None => {
                self.collapsed = true;
                false
            }
        }
    }

    /// Syncs the camera to the current size and draws `content`, unless the
    /// viewport is collapsed.
    pub fn render(&mut self, backend: &B, content: &mut impl ViewportContent<B>) -> Result<(), GpuError> {
        if self.size.x > 0 && self.size.y > 0 {
            self.camera.resize(self.size.x, self.size.y);
        }
        self.camera.update_ubo(backend)?;

        if self.collapsed || self.size.x == 0 || self.size.y == 0 {
            return Ok(());
        }
        content.render(self.region(), &self.camera);
        Ok(())
    }

    /// Runs the content's focus behavior.
    pub fn focus(&mut self, content: &mut impl ViewportContent<B>) {
        log::debug!("viewport '{}' focused", self.name);
        content.on_focus(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;
    use crate::gpu::recording::RecordingBackend;
    use glam::Vec3;

    #[derive(Default)]
    struct Recorder {
        rendered: Vec<Region>,
        focused: Vec<String>,
    }

    impl ViewportContent<RecordingBackend> for Recorder {
        fn render(&mut self, region: Region, _camera: &Camera<RecordingBackend>) {
            self.rendered.push(region);
        }

        fn on_focus(&mut self, viewport: &mut Viewport<RecordingBackend>) {
            self.focused.push(viewport.name().to_owned());
        }
    }

    fn viewport(gpu: &RecordingBackend) -> Viewport<RecordingBackend> {
        let state = CameraState::new(Vec3::X, Vec3::ZERO, (1, 1), 1.0, 0.1, 10.0);
        Viewport::new("S2", Camera::new(gpu, state), IVec2::new(10, 20), UVec2::new(400, 200))
    }

    #[test]
    fn collapsed_viewports_still_sync_their_camera() {
        let gpu = RecordingBackend::new();
        let mut vp = viewport(&gpu);
        let mut recorder = Recorder::default();
        let ubo = vp.camera().bind_ubo().id().unwrap();

        vp.render(&gpu, &mut recorder).unwrap();
        assert_eq!(recorder.rendered, vec![vp.region()]);
        assert_eq!(vp.camera().state().aspect, 0.5);

        vp.set_collapsed(true);
        vp.set_layout(IVec2::ZERO, UVec2::new(100, 300));
        let writes = gpu.writes_to(ubo);
        vp.render(&gpu, &mut recorder).unwrap();
        assert_eq!(recorder.rendered.len(), 1);
        assert_eq!(gpu.writes_to(ubo), writes + 1);
        assert_eq!(vp.camera().state().aspect, 3.0);
    }

    #[test]
    fn pinned_layout_ignores_moves() {
        let gpu = RecordingBackend::new();
        let mut vp = viewport(&gpu)
            .with_fixed_pos(IVec2::new(5, 5))
            .with_fixed_size(UVec2::new(64, 32));
        vp.set_layout(IVec2::new(100, 100), UVec2::new(1, 1));
        assert_eq!(
            vp.region(),
            Region {
                x: 5,
                y: 5,
                width: 64,
                height: 32
            }
        );
        assert_eq!(vp.center(), Vec2::new(37.0, 21.0));
    }

    #[test]
    fn focus_hands_the_viewport_to_its_content() {
        let gpu = RecordingBackend::new();
        let mut vp = viewport(&gpu);
        let mut recorder = Recorder::default();
        vp.focus(&mut recorder);
        assert_eq!(recorder.focused, vec!["S2".to_owned()]);
    }

    #[test]
    fn regions_clamp_to_the_target() {
        let r = Region {
            x: -10,
            y: 50,
            width: 100,
            height: 100,
        };
        assert_eq!(
            r.clamp_to(80, 120),
            Some(Region {
                x: 0,
                y: 50,
                width: 80,
                height: 70
            })
        );
        assert_eq!(r.clamp_to(200, 40), None);
    }
}
