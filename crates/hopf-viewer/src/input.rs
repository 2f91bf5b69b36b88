use glam::{Vec2, Vec3};
use winit::keyboard::KeyCode;

/// Held movement keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveKeys {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl MoveKeys {
    /// Updates the held state. Returns `false` for keys that do not move.
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        let slot = match code {
            KeyCode::KeyW => &mut self.forward,
            KeyCode::KeyS => &mut self.back,
            KeyCode::KeyA => &mut self.left,
            KeyCode::KeyD => &mut self.right,
            KeyCode::Space => &mut self.up,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => &mut self.down,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// x right, y up, z forward; opposing keys cancel.
    pub fn direction(&self) -> Vec3 {
        let axis = |pos: bool, neg: bool| pos as i32 as f32 - neg as i32 as f32;
        Vec3::new(
            axis(self.right, self.left),
            axis(self.up, self.down),
            axis(self.forward, self.back),
        )
    }
}

/// (pitch, yaw) for a raw mouse delta.
pub fn look_delta(delta: (f64, f64), sensitivity: f32) -> Vec2 {
    Vec2::new(-(delta.1 as f32) * sensitivity, -(delta.0 as f32) * sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_camera_axes() {
        let mut keys = MoveKeys::default();
        assert!(keys.handle_key(KeyCode::KeyW, true));
        assert!(keys.handle_key(KeyCode::KeyA, true));
        assert!(keys.handle_key(KeyCode::Space, true));
        assert_eq!(keys.direction(), Vec3::new(-1.0, 1.0, 1.0));

        keys.handle_key(KeyCode::ShiftLeft, true);
        keys.handle_key(KeyCode::KeyW, false);
        assert_eq!(keys.direction(), Vec3::new(-1.0, 0.0, 0.0));

        assert!(!keys.handle_key(KeyCode::KeyQ, true));
        keys.clear();
        assert_eq!(keys.direction(), Vec3::ZERO);
    }

    #[test]
    fn mouse_motion_maps_to_pitch_and_yaw() {
        let look = look_delta((10.0, -4.0), 0.01);
        assert!((look.x - 0.04).abs() < 1e-6);
        assert!((look.y + 0.1).abs() < 1e-6);
    }
}
