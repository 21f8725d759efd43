/// Scene graph: two lights and at most one mesh
use nalgebra::{Point3, Vector3};

use crate::config::{Color, ViewerConfig};
use crate::geometry::Mesh;
use crate::transform::RotationState;

pub const HEMISPHERE_SKY: Color = Color::from_hex(0xffffff);
pub const HEMISPHERE_GROUND: Color = Color::from_hex(0x444444);

/// Sky/ground ambient light; the sky side faces `position`
#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky: Color,
    pub ground: Color,
    pub position: Point3<f32>,
}

impl HemisphereLight {
    fn irradiance(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        let up = unit_or_z(&self.position.coords);
        let weight = 0.5 * normal.dot(&up) + 0.5;
        self.ground.to_vector().lerp(&self.sky.to_vector(), weight)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    /// Unit vector pointing from the scene toward the light
    pub direction: Vector3<f32>,
}

impl DirectionalLight {
    pub fn new(color: Color, position: Point3<f32>) -> Self {
        Self {
            color,
            direction: unit_or_z(&position.coords),
        }
    }

    fn irradiance(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        self.color.to_vector() * normal.dot(&self.direction).max(0.0)
    }
}

fn unit_or_z(v: &Vector3<f32>) -> Vector3<f32> {
    v.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z)
}

/// The loaded model placed in the scene
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub mesh: Mesh,
    pub color: Color,
    pub rotation: RotationState,
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub hemisphere: HemisphereLight,
    pub directional: DirectionalLight,
    pub mesh: Option<MeshNode>,
}

impl Scene {
    /// Lights-only scene; both lights share the configured position
    pub fn with_lights(config: &ViewerConfig) -> Self {
        Self {
            hemisphere: HemisphereLight {
                sky: HEMISPHERE_SKY,
                ground: HEMISPHERE_GROUND,
                position: config.light_position,
            },
            directional: DirectionalLight::new(config.light_color, config.light_position),
            mesh: None,
        }
    }

    pub fn add_mesh(&mut self, node: MeshNode) {
        self.mesh = Some(node);
    }

    /// Lambert shading of a surface with world-space `normal` and `base` color.
    /// Channels are clamped to `0.0..=1.0`.
    pub fn shade(&self, normal: &Vector3<f32>, base: Color) -> Vector3<f32> {
        let light = self.hemisphere.irradiance(normal) + self.directional.irradiance(normal);
        base.to_vector()
            .component_mul(&light)
            .map(|c| c.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerProps;
    use approx::assert_relative_eq;

    fn scene() -> Scene {
        let config = ViewerProps::new("a.stl").validate().unwrap();
        Scene::with_lights(&config)
    }

    #[test]
    fn test_lights_share_position() {
        let props = ViewerProps {
            light_x: 0.0,
            light_y: 3.0,
            light_z: 4.0,
            ..ViewerProps::new("a.stl")
        };
        let scene = Scene::with_lights(&props.validate().unwrap());
        assert_eq!(scene.hemisphere.position, Point3::new(0.0, 3.0, 4.0));
        assert_relative_eq!(scene.directional.direction, Vector3::new(0.0, 0.6, 0.8));
        assert!(scene.mesh.is_none());
    }

    #[test]
    fn test_zero_light_position_points_along_z() {
        let light = DirectionalLight::new(Color::WHITE, Point3::origin());
        assert_eq!(light.direction, Vector3::z());
    }

    #[test]
    fn test_facing_surface_is_brighter_than_averted() {
        let scene = scene();
        let base = Color::new(200, 100, 50);
        let lit = scene.shade(&Vector3::z(), base);
        let dark = scene.shade(&-Vector3::z(), base);
        assert!(lit.sum() > dark.sum());
        // Facing both white lights doubles the base color, then clamps
        assert_relative_eq!(
            lit,
            (base.to_vector() * 2.0).map(|c| c.min(1.0)),
            epsilon = 1e-6
        );
        // Facing away only the ground color remains
        assert_relative_eq!(
            dark,
            base.to_vector().component_mul(&HEMISPHERE_GROUND.to_vector()),
            epsilon = 1e-6
        );
    }
}
