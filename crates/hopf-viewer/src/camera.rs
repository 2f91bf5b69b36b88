use crate::gpu::{Buffer, BufferRoles, GpuBackend, GpuError, Usage};
use glam::{Mat3, Mat4, Vec3, Vec4};
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::sync::Arc;

/// World "up". Translation keeps vertical motion on this axis and yaw turns about it.
pub const WORLD_UP: Vec3 = Vec3::Z;

/// Camera uniform block, matching `struct Camera` in the render shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// `proj * view`.
    pub pv: [[f32; 4]; 4],
    pub cam_pos: [f32; 4],
    pub cam_dir: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub _pad: [f32; 2],
}

const _: [(); 240] = [(); core::mem::size_of::<CameraUniform>()];

/// Orthonormal camera basis looking along `normal`: columns are
/// `(right, up, normal)` with `up` as close to `WORLD_UP` as possible.
pub fn orth_coords_left(normal: Vec3) -> Mat3 {
    let forward = normal.try_normalize().unwrap_or(Vec3::X);
    let right = forward
        .cross(WORLD_UP)
        .try_normalize()
        .unwrap_or_else(|| forward.cross(Vec3::X).normalize());
    let up = right.cross(forward).normalize();
    Mat3::from_cols(right, up, forward)
}

/// Gram-Schmidt on the columns, keeping the forward axis fixed.
fn reorthonormalize(coords: Mat3) -> Mat3 {
    let forward = coords.z_axis.normalize();
    let up = (coords.y_axis - coords.y_axis.dot(forward) * forward).normalize();
    let right = up.cross(forward);
    Mat3::from_cols(right, up, forward)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    /// Columns: right, up, forward. Always orthonormal.
    pub coords: Mat3,
    pub fov: f32,
    /// `height / width`.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    pub fn new(normal: Vec3, position: Vec3, size: (u32, u32), fov: f32, near: f32, far: f32) -> Self {
        let mut state = Self {
            position,
            coords: orth_coords_left(normal),
            fov,
            aspect: 1.0,
            near,
            far,
        };
        state.resize(size.0, size.1);
        state
    }

    pub fn right(&self) -> Vec3 {
        self.coords.x_axis
    }

    pub fn up(&self) -> Vec3 {
        self.coords.y_axis
    }

    pub fn forward(&self) -> Vec3 {
        self.coords.z_axis
    }

    /// Pitches about the current right axis, then yaws about `WORLD_UP`.
    /// Returns `false` (and changes nothing) when `|pitch| > π`.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) -> bool {
        if pitch.abs() > PI || !pitch.is_finite() || !yaw.is_finite() {
            return false;
        }
        let pitch_rot = Mat3::from_axis_angle(self.right(), -pitch);
        let yaw_rot = Mat3::from_axis_angle(WORLD_UP, -yaw);
        self.coords = reorthonormalize(pitch_rot * yaw_rot * self.coords);
        true
    }

    /// Moves along `(right, WORLD_UP, horizontal forward)` weighted by `delta`,
    /// `speed` units in total. Returns `false` for a zero motion.
    pub fn translate(&mut self, delta: Vec3, speed: f32) -> bool {
        if delta == Vec3::ZERO {
            return false;
        }
        let forward = self.forward();
        let offsets = Mat3::from_cols(self.right(), WORLD_UP, Vec3::new(forward.x, forward.y, 0.0));
        let Some(dir) = (offsets * delta).try_normalize() else {
            return false;
        };
        self.position += speed * dir;
        true
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = height as f32 / width as f32;
        }
    }

    /// World to camera: shift the near-plane eye to the origin, then rotate by
    /// the transposed basis.
    pub fn view(&self) -> Mat4 {
        let eye = self.position - self.forward() * self.near;
        Mat4::from_mat3(self.coords.transpose()) * Mat4::from_translation(-eye)
    }

    /// Perspective with depth mapped to `[0, 1]` and `+z` forward.
    pub fn projection(&self) -> Mat4 {
        let f = 1.0 / (self.fov * 0.5).tan();
        let range = self.far - self.near;
        Mat4::from_cols(
            Vec4::new(f * self.aspect, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, self.far / range, 1.0),
            Vec4::new(0.0, 0.0, -self.far * self.near / range, 0.0),
        )
    }

    pub fn uniform(&self) -> CameraUniform {
        let view = self.view();
        let proj = self.projection();
        CameraUniform {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            pv: (proj * view).to_cols_array_2d(),
            cam_pos: self.position.extend(1.0).to_array(),
            cam_dir: self.forward().extend(0.0).to_array(),
            near: self.near,
            far: self.far,
            _pad: [0.0; 2],
        }
    }
}

/// Camera state shared with the updater thread.
pub type CameraHandle = Arc<Mutex<CameraState>>;

/// A camera and its device-resident uniform block.
///
/// State mutations lock the shared handle; the uniform block only changes in
/// [`Camera::update_ubo`].
pub struct Camera<B: GpuBackend> {
    state: CameraHandle,
    ubo: Buffer<B>,
}

impl<B: GpuBackend> Camera<B> {
    pub fn new(backend: &B, state: CameraState) -> Self {
        let mut ubo = Buffer::new("Camera UBO", BufferRoles::UNIFORM);
        ubo.upload(backend, bytemuck::bytes_of(&state.uniform()), Usage::DynamicDraw);
        Self {
            state: Arc::new(Mutex::new(state)),
            ubo,
        }
    }

    pub fn handle(&self) -> CameraHandle {
        self.state.clone()
    }

    pub fn state(&self) -> CameraState {
        *self.state.lock()
    }

    pub fn rotate(&self, pitch: f32, yaw: f32) -> bool {
        self.state.lock().rotate(pitch, yaw)
    }

    pub fn translate(&self, delta: Vec3, speed: f32) -> bool {
        self.state.lock().translate(delta, speed)
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.state.lock().resize(width, height);
    }

    /// Writes the current view, projection and eye into the uniform block.
    pub fn update_ubo(&mut self, backend: &B) -> Result<(), GpuError> {
        let uniform = self.state.lock().uniform();
        self.ubo.write_at(backend, 0, bytemuck::bytes_of(&uniform))
    }

    /// The uniform block, for binding at the camera slot of a render pipeline.
    pub fn bind_ubo(&self) -> &Buffer<B> {
        &self.ubo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use proptest::prelude::*;

    fn state() -> CameraState {
        CameraState::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::splat(5.0),
            (800, 600),
            60f32.to_radians(),
            0.1,
            100.0,
        )
    }

    fn assert_orthonormal(m: Mat3) {
        for axis in [m.x_axis, m.y_axis, m.z_axis] {
            assert!((axis.length() - 1.0).abs() < 1e-4, "{m:?}");
        }
        assert!(m.x_axis.dot(m.y_axis).abs() < 1e-4);
        assert!(m.y_axis.dot(m.z_axis).abs() < 1e-4);
        assert!(m.z_axis.dot(m.x_axis).abs() < 1e-4);
    }

    #[test]
    fn basis_looks_along_normal_with_z_up() {
        let coords = orth_coords_left(Vec3::X);
        assert!(coords.z_axis.distance(Vec3::X) < 1e-6);
        assert!(coords.x_axis.distance(Vec3::NEG_Y) < 1e-6);
        assert!(coords.y_axis.distance(Vec3::Z) < 1e-6);
        assert_orthonormal(orth_coords_left(Vec3::Z));
    }

    #[test]
    fn oversized_pitch_is_rejected() {
        let gpu = RecordingBackend::new();
        let mut camera = Camera::new(&gpu, state());
        camera.update_ubo(&gpu).unwrap();
        let before_state = camera.state();
        let before_ubo = camera.bind_ubo().read::<u8>(&gpu).unwrap();

        assert!(!camera.rotate(PI + 0.01, 0.3));
        assert!(!camera.rotate(-4.0, 0.0));
        camera.update_ubo(&gpu).unwrap();

        assert_eq!(camera.state(), before_state);
        assert_eq!(camera.bind_ubo().read::<u8>(&gpu).unwrap(), before_ubo);
    }

    proptest! {
        #[test]
        fn rotations_keep_the_basis_orthonormal(
            steps in proptest::collection::vec((-PI..=PI, -10.0f32..10.0), 1..64)
        ) {
            let mut s = state();
            for (pitch, yaw) in steps {
                prop_assert!(s.rotate(pitch, yaw));
            }
            assert_orthonormal(s.coords);
        }
    }

    #[test]
    fn zero_translation_never_moves() {
        let mut s = state();
        let before = s.position;
        assert!(!s.translate(Vec3::ZERO, 10.0));
        assert_eq!(s.position, before);

        assert!(s.translate(Vec3::new(0.0, 1.0, 0.0), 2.0));
        assert!(s.position.distance(before + 2.0 * WORLD_UP) < 1e-5);
    }

    #[test]
    fn forward_motion_stays_horizontal() {
        let mut s = state();
        let before = s.position;
        s.translate(Vec3::Z, 1.0);
        assert!((s.position.z - before.z).abs() < 1e-6);
        assert!((s.position.distance(before) - 1.0).abs() < 1e-5);

        // Looking straight down there is no horizontal forward.
        let mut down = CameraState::new(Vec3::NEG_Z, Vec3::ZERO, (1, 1), 1.0, 0.1, 10.0);
        assert!(!down.translate(Vec3::Z, 1.0));
        assert_eq!(down.position, Vec3::ZERO);
    }

    #[test]
    fn resize_sets_height_over_width() {
        let mut s = state();
        s.resize(1000, 250);
        assert_eq!(s.aspect, 0.25);
        s.resize(0, 100);
        assert_eq!(s.aspect, 0.25);
    }

    #[test]
    fn depth_spans_zero_to_one() {
        let s = state();
        let pv = s.projection() * s.view();
        let eye = s.position - s.forward() * s.near;

        let near = pv * (eye + s.forward() * s.near).extend(1.0);
        let far = pv * (eye + s.forward() * s.far).extend(1.0);
        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);

        let right = pv * (s.position + s.forward() * 5.0 + s.right()).extend(1.0);
        assert!(right.x / right.w > 0.0);
        let up = pv * (s.position + s.forward() * 5.0 + s.up()).extend(1.0);
        assert!(up.y / up.w > 0.0);
    }
}
