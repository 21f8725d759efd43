/// Perspective camera and screen projection
use nalgebra::{Matrix4, Point3, Vector3};

use crate::config::CameraPlacement;

/// Vertical field of view, in degrees
pub const CAMERA_FOV_DEGREES: f32 = 30.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 10_000.0;

/// Multiple of the largest model extent used when no camera Z is configured
pub const AUTO_DISTANCE_FACTOR: f32 = 3.0;

/// A projected point in pixel coordinates plus normalized depth (`-1..=1`, near to far)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: CAMERA_FOV_DEGREES.to_radians(),
            aspect: width as f32 / height as f32,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.view_up())
    }

    /// `up`, or a substitute axis when the view direction is parallel to it
    fn view_up(&self) -> Vector3<f32> {
        let forward = self.target - self.position;
        let parallel = |up: &Vector3<f32>| {
            forward.cross(up).norm_squared() <= 1e-12 * forward.norm_squared() * up.norm_squared()
        };
        if !parallel(&self.up) {
            return self.up;
        }
        [Vector3::z(), Vector3::x()]
            .into_iter()
            .find(|axis| !parallel(axis))
            .unwrap_or(self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Project a model-space point into a `width` x `height` pixel grid.
    ///
    /// Returns `None` for points behind the camera or outside the depth range;
    /// points off the sides of the screen are still returned so triangles
    /// straddling the border rasterize correctly.
    pub fn project(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<ScreenPoint> {
        let mvp = self.projection_matrix() * self.view_matrix() * model_matrix;
        self.project_with(&mvp, point, width, height)
    }

    pub(crate) fn project_with(
        &self,
        mvp: &Matrix4<f32>,
        point: &Point3<f32>,
        width: u32,
        height: u32,
    ) -> Option<ScreenPoint> {
        let clip = mvp * point.to_homogeneous();
        if clip.w <= f32::EPSILON {
            return None;
        }

        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }

        Some(ScreenPoint {
            x: (ndc.x + 1.0) * 0.5 * width as f32,
            y: (1.0 - ndc.y) * 0.5 * height as f32,
            depth: ndc.z,
        })
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(800, 600)
    }
}

/// Camera Z for a model whose bounding box has the given extents.
///
/// An explicit Z always wins; otherwise the camera backs off to three times
/// the largest extent so the whole model is framed.
pub fn camera_distance(placement: &CameraPlacement, extents: &Vector3<f32>) -> f32 {
    match placement.z {
        Some(z) => z,
        None => {
            let derived = AUTO_DISTANCE_FACTOR * extents.max();
            if derived > 0.0 {
                derived
            } else {
                CAMERA_NEAR * 2.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::perspective(800, 600);
        assert_relative_eq!(camera.aspect, 800.0 / 600.0);
        assert_relative_eq!(camera.fov, 30f32.to_radians());
        assert_eq!(camera.near, 1.0);
        assert_eq!(camera.far, 10_000.0);
    }

    #[test]
    fn test_derived_camera_distance() {
        let placement = CameraPlacement { x: 0.0, y: 0.0, z: None };
        let extents = Vector3::new(2.0, 4.0, 6.0);
        assert_relative_eq!(camera_distance(&placement, &extents), 18.0);
    }

    #[test]
    fn test_explicit_camera_distance_wins() {
        let placement = CameraPlacement { x: 0.0, y: 0.0, z: Some(50.0) };
        for extents in [Vector3::new(2.0, 4.0, 6.0), Vector3::new(900.0, 1.0, 1.0)] {
            assert_eq!(camera_distance(&placement, &extents), 50.0);
        }
    }

    #[test]
    fn test_flat_model_distance_stays_positive() {
        let placement = CameraPlacement { x: 0.0, y: 0.0, z: None };
        assert!(camera_distance(&placement, &Vector3::zeros()) > 0.0);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::perspective(200, 100);
        let p = camera
            .project(&Point3::origin(), &Matrix4::identity(), 200, 100)
            .unwrap();
        assert_relative_eq!(p.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(p.y, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_camera_on_up_axis_has_finite_view() {
        for y in [10.0, -10.0] {
            let mut camera = Camera::perspective(200, 100);
            camera.position = Point3::new(0.0, y, 0.0);
            camera.look_at(Point3::origin());
            assert!(camera.view_matrix().iter().all(|v| v.is_finite()));
            let p = camera
                .project(&Point3::origin(), &Matrix4::identity(), 200, 100)
                .unwrap();
            assert_relative_eq!(p.x, 100.0, epsilon = 1e-3);
            assert_relative_eq!(p.y, 50.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_point_behind_camera_is_rejected() {
        let camera = Camera::perspective(200, 100);
        let behind = Point3::new(0.0, 0.0, 10.0);
        assert!(camera.project(&behind, &Matrix4::identity(), 200, 100).is_none());
    }
}
