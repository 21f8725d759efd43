/// Drag-to-orbit camera controller
use nalgebra::Vector3;
use std::f32::consts::{PI, TAU};

use crate::projection::{Camera, CAMERA_FAR, CAMERA_NEAR};

/// Keeps the camera off the poles so `up` never aligns with the view direction
const POLE_EPSILON: f32 = 1e-3;
/// Minimum squared camera movement that counts as a change
const CHANGE_EPSILON: f32 = 1e-6;
const KEY_ROTATE_PIXELS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitKey {
    Up,
    Down,
    Left,
    Right,
}

/// Host input forwarded to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbitInput {
    /// Pointer drag, in pixels since the previous event
    Rotate { dx: f32, dy: f32 },
    /// Wheel delta; positive moves the camera away
    Dolly(f32),
    Key(OrbitKey),
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_keys: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    viewport_height: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
}

impl OrbitControls {
    pub fn new(viewport_height: u32) -> Self {
        Self {
            enable_keys: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: CAMERA_NEAR,
            max_distance: CAMERA_FAR,
            viewport_height: viewport_height.max(1) as f32,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
        }
    }

    /// Queue an input event. Returns `false` when the event was ignored.
    pub fn handle_input(&mut self, input: OrbitInput) -> bool {
        match input {
            OrbitInput::Rotate { dx, dy } => self.rotate_pixels(dx, dy),
            OrbitInput::Dolly(delta) if delta != 0.0 => {
                let step = 0.95f32.powf(self.zoom_speed);
                self.pending_scale *= if delta > 0.0 { 1.0 / step } else { step };
            }
            OrbitInput::Dolly(_) => return false,
            OrbitInput::Key(_) if !self.enable_keys => return false,
            OrbitInput::Key(key) => {
                let (dx, dy) = match key {
                    OrbitKey::Up => (0.0, -KEY_ROTATE_PIXELS),
                    OrbitKey::Down => (0.0, KEY_ROTATE_PIXELS),
                    OrbitKey::Left => (-KEY_ROTATE_PIXELS, 0.0),
                    OrbitKey::Right => (KEY_ROTATE_PIXELS, 0.0),
                };
                self.rotate_pixels(dx, dy);
            }
        }
        true
    }

    fn rotate_pixels(&mut self, dx: f32, dy: f32) {
        // A drag across the full panel height is one full turn
        let scale = TAU / self.viewport_height * self.rotate_speed;
        self.pending_theta -= dx * scale;
        self.pending_phi -= dy * scale;
    }

    pub fn has_pending(&self) -> bool {
        self.pending_theta != 0.0 || self.pending_phi != 0.0 || self.pending_scale != 1.0
    }

    /// Apply queued input to the camera, orbiting around its target.
    /// Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if !self.has_pending() {
            return false;
        }

        let offset = camera.position - camera.target;
        let radius = offset.norm();
        let theta = offset.x.atan2(offset.z) + self.pending_theta;
        let phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI / 2.0
        };
        let phi = (phi + self.pending_phi).clamp(POLE_EPSILON, PI - POLE_EPSILON);
        let radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

        self.pending_theta = 0.0;
        self.pending_phi = 0.0;
        self.pending_scale = 1.0;

        let new_offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let previous = camera.position;
        camera.position = camera.target + new_offset;
        camera.look_at(camera.target);

        (camera.position - previous).norm_squared() > CHANGE_EPSILON
    }
}
