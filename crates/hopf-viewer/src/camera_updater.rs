//! Background thread that moves whichever camera currently has control.
//!
//! The render thread attaches a camera (and the window whose cursor it
//! captures) with [`CameraUpdater::set_data`], feeds keyboard direction and
//! mouse deltas, and the updater applies them at a fixed cadence. Camera
//! state is shared through [`CameraHandle`], so every mutation is locked.

use crate::camera::CameraHandle;
use glam::{Vec2, Vec3};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use winit::dpi::PhysicalPosition;
use winit::window::{CursorGrabMode, Window};

/// OS mouse capture for the window that owns the attached viewport.
pub trait CursorCapture: Send + Sync {
    fn set_captured(&self, captured: bool);
    fn center_cursor(&self, center: Vec2);
}

impl CursorCapture for Window {
    fn set_captured(&self, captured: bool) {
        if captured {
            if self.set_cursor_grab(CursorGrabMode::Locked).is_err() {
                if let Err(e) = self.set_cursor_grab(CursorGrabMode::Confined) {
                    log::warn!("cursor grab unavailable: {}", e);
                }
            }
        } else if let Err(e) = self.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("failed to release cursor: {}", e);
        }
        self.set_cursor_visible(!captured);
    }

    fn center_cursor(&self, center: Vec2) {
        let position = PhysicalPosition::new(center.x as f64, center.y as f64);
        if let Err(e) = self.set_cursor_position(position) {
            log::debug!("cannot move cursor: {}", e);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UpdaterSettings {
    /// Units per second.
    pub speed: f32,
    pub interval: Duration,
}

#[derive(Default)]
struct Attachment {
    cursor: Option<Arc<dyn CursorCapture>>,
    camera: Option<CameraHandle>,
    center: Vec2,
}

#[derive(Default)]
struct Motion {
    direction: Vec3,
    /// Accumulated (pitch, yaw) not yet applied.
    look: Vec2,
}

struct Shared {
    attachment: Mutex<Attachment>,
    motion: Mutex<Motion>,
    wake: Condvar,
    running: AtomicBool,
}

pub struct CameraUpdater {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl CameraUpdater {
    pub fn spawn(settings: UpdaterSettings) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            attachment: Mutex::new(Attachment::default()),
            motion: Mutex::new(Motion::default()),
            wake: Condvar::new(),
            running: AtomicBool::new(true),
        });
        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name("camera-updater".into())
            .spawn(move || run(&worker, settings))?;
        log::debug!("camera updater started ({:?} cadence)", settings.interval);

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Hands control to `camera`, capturing the mouse on `cursor`.
    ///
    /// Passing the camera that is already attached does nothing. Otherwise the
    /// previous cursor is released before the new one is captured, so at most
    /// one viewport holds the mouse.
    pub fn set_data(&self, cursor: Option<Arc<dyn CursorCapture>>, camera: Option<CameraHandle>, center: Vec2) {
        let mut attachment = self.shared.attachment.lock();
        let same = match (&attachment.camera, &camera) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        if let Some(old) = attachment.cursor.take() {
            old.set_captured(false);
        }
        if let Some(new) = &cursor {
            new.set_captured(true);
            new.center_cursor(center);
        }
        log::debug!(
            "camera updater {}",
            if camera.is_some() { "attached" } else { "detached" }
        );
        attachment.cursor = cursor;
        attachment.camera = camera;
        attachment.center = center;

        *self.shared.motion.lock() = Motion::default();
        self.shared.wake.notify_all();
    }

    pub fn is_attached(&self) -> bool {
        self.shared.attachment.lock().camera.is_some()
    }

    pub fn is_attached_to(&self, camera: &CameraHandle) -> bool {
        self.shared
            .attachment
            .lock()
            .camera
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, camera))
    }

    /// Viewport center the cursor is re-centered to while captured.
    pub fn center(&self) -> Option<Vec2> {
        let attachment = self.shared.attachment.lock();
        attachment.camera.as_ref().map(|_| attachment.center)
    }

    /// Movement direction in camera terms: x right, y up, z forward.
    pub fn set_direction(&self, direction: Vec3) {
        self.shared.motion.lock().direction = direction;
    }

    /// Queues a rotation for the next tick.
    pub fn queue_look(&self, pitch: f32, yaw: f32) {
        self.shared.motion.lock().look += Vec2::new(pitch, yaw);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Releases any capture, stops the thread and waits for it.
    pub fn stop(&mut self) {
        self.set_data(None, None, Vec2::ZERO);
        {
            let _attachment = self.shared.attachment.lock();
            self.shared.running.store(false, Ordering::Release);
            self.shared.wake.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("camera updater panicked");
            }
            log::debug!("camera updater stopped");
        }
    }
}

impl Drop for CameraUpdater {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, settings: UpdaterSettings) {
    let mut attachment = shared.attachment.lock();
    let mut last = Instant::now();

    while shared.running.load(Ordering::Acquire) {
        let Some(camera) = attachment.camera.clone() else {
            shared.wake.wait(&mut attachment);
            last = Instant::now();
            continue;
        };

        let dt = last.elapsed().as_secs_f32();
        last = Instant::now();
        let (direction, look) = {
            let mut motion = shared.motion.lock();
            (motion.direction, std::mem::take(&mut motion.look))
        };
        {
            let mut state = camera.lock();
            if look != Vec2::ZERO {
                state.rotate(look.x, look.y);
            }
            state.translate(direction, settings.speed * dt);
        }

        shared.wake.wait_for(&mut attachment, settings.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeCursor {
        captured: AtomicUsize,
        released: AtomicUsize,
    }

    impl CursorCapture for FakeCursor {
        fn set_captured(&self, captured: bool) {
            let counter = if captured { &self.captured } else { &self.released };
            counter.fetch_add(1, Ordering::SeqCst);
        }

        fn center_cursor(&self, _center: Vec2) {}
    }

    fn settings() -> UpdaterSettings {
        UpdaterSettings {
            speed: 10.0,
            interval: Duration::from_millis(1),
        }
    }

    fn camera() -> CameraHandle {
        Arc::new(Mutex::new(CameraState::new(
            Vec3::X,
            Vec3::ZERO,
            (100, 100),
            1.0,
            0.1,
            10.0,
        )))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn detach_releases_capture_once_and_stops_motion() {
        let updater = CameraUpdater::spawn(settings()).unwrap();
        let cursor = Arc::new(FakeCursor::default());
        let cam = camera();

        updater.set_data(Some(cursor.clone()), Some(cam.clone()), Vec2::new(50.0, 50.0));
        updater.set_direction(Vec3::Z);
        assert!(wait_until(|| cam.lock().position != Vec3::ZERO));
        assert_eq!(cursor.captured.load(Ordering::SeqCst), 1);

        updater.set_data(None, None, Vec2::ZERO);
        assert_eq!(cursor.released.load(Ordering::SeqCst), 1);
        let parked = cam.lock().position;

        thread::sleep(Duration::from_millis(30));
        assert_eq!(cam.lock().position, parked);

        updater.set_data(None, None, Vec2::ZERO);
        assert_eq!(cursor.released.load(Ordering::SeqCst), 1);
        assert!(!updater.is_attached());
    }

    #[test]
    fn reattaching_the_same_camera_is_a_no_op() {
        let updater = CameraUpdater::spawn(settings()).unwrap();
        let cursor = Arc::new(FakeCursor::default());
        let cam = camera();

        updater.set_data(Some(cursor.clone()), Some(cam.clone()), Vec2::ZERO);
        updater.set_data(Some(cursor.clone()), Some(cam.clone()), Vec2::ZERO);
        assert_eq!(cursor.captured.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.released.load(Ordering::SeqCst), 0);
        assert!(updater.is_attached_to(&cam));
        assert!(!updater.is_attached_to(&camera()));
    }

    #[test]
    fn switching_cameras_moves_capture() {
        let updater = CameraUpdater::spawn(settings()).unwrap();
        let (left, right) = (Arc::new(FakeCursor::default()), Arc::new(FakeCursor::default()));

        updater.set_data(Some(left.clone()), Some(camera()), Vec2::ZERO);
        updater.set_data(Some(right.clone()), Some(camera()), Vec2::ZERO);
        assert_eq!(left.released.load(Ordering::SeqCst), 1);
        assert_eq!(right.captured.load(Ordering::SeqCst), 1);
        assert_eq!(right.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn queued_look_is_applied_once() {
        let updater = CameraUpdater::spawn(settings()).unwrap();
        let cam = camera();
        let before = cam.lock().coords;

        updater.set_data(None, Some(cam.clone()), Vec2::ZERO);
        updater.queue_look(0.0, 0.5);
        assert!(wait_until(|| cam.lock().coords != before));

        let mut expected = CameraState::new(Vec3::X, Vec3::ZERO, (100, 100), 1.0, 0.1, 10.0);
        expected.rotate(0.0, 0.5);
        thread::sleep(Duration::from_millis(20));
        assert!(cam.lock().forward().distance(expected.forward()) < 1e-5);
    }

    #[test]
    fn stop_joins_and_releases() {
        let mut updater = CameraUpdater::spawn(settings()).unwrap();
        let cursor = Arc::new(FakeCursor::default());
        updater.set_data(Some(cursor.clone()), Some(camera()), Vec2::ZERO);

        updater.stop();
        assert!(!updater.is_running());
        assert!(updater.thread.is_none());
        assert_eq!(cursor.released.load(Ordering::SeqCst), 1);

        // A detached updater parked on the condvar also stops promptly.
        let mut idle = CameraUpdater::spawn(settings()).unwrap();
        idle.stop();
        assert!(idle.thread.is_none());
    }
}
