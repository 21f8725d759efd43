/// Model rotation state
use nalgebra::{Matrix4, Vector3};
use std::f32::consts::TAU;

/// Rotation around three axes (radians), applied in XYZ order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn from_speeds(speeds: [f32; 3]) -> Self {
        let [x, y, z] = speeds;
        Self::new(x, y, z).wrapped()
    }

    /// Advance by one frame's increments, keeping each angle in `[0, 2π)`
    pub fn advance(&mut self, speeds: [f32; 3]) {
        self.x += speeds[0];
        self.y += speeds[1];
        self.z += speeds[2];
        *self = self.wrapped();
    }

    fn wrapped(self) -> Self {
        Self::new(
            self.x.rem_euclid(TAU),
            self.y.rem_euclid(TAU),
            self.z.rem_euclid(TAU),
        )
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(self.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, self.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, self.z));
        rx * ry * rz
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}
