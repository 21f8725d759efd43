/// Geometry primitives for the loaded model
use nalgebra::{Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }

    pub fn at(position: Point3<f32>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
        }
    }
}

/// A triangle face: three vertices plus the face normal
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
    pub normal: Vector3<f32>,
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        let mut triangle = Self {
            vertices: [v0, v1, v2],
            normal: Vector3::zeros(),
        };
        triangle.normal = triangle.calculate_normal();
        triangle
    }

    /// Face normal from the counter-clockwise winding; zero for degenerate faces
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.vertices.map(|v| v.position);
        (v1 - v0)
            .cross(&(v2 - v0))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn extents(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn max_extent(&self) -> f32 {
        self.extents().max()
    }
}

/// A 3D mesh composed of independent triangles
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Recompute face normals from the winding and copy them onto each vertex.
    ///
    /// STL facets share no vertices, so the vertex normal of every corner is
    /// the normal of the face it belongs to.
    pub fn compute_normals(&mut self) {
        for triangle in &mut self.triangles {
            triangle.normal = triangle.calculate_normal();
            for vertex in &mut triangle.vertices {
                vertex.normal = triangle.normal;
            }
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut positions = self
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.position));
        let first = positions.next()?;
        let (min, max) = positions.fold((first, first), |(min, max), p| {
            (min.inf(&p), max.sup(&p))
        });
        Some(BoundingBox { min, max })
    }

    /// Translate the mesh so its bounding-box center sits at the origin.
    /// Returns the translation that was applied.
    pub fn center(&mut self) -> Vector3<f32> {
        let Some(bounds) = self.bounding_box() else {
            return Vector3::zeros();
        };
        let offset = -bounds.center().coords;
        for triangle in &mut self.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position += offset;
            }
        }
        offset
    }

    /// Axis-aligned cube centered on the origin, used as the demo model
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // Each face: outward normal and its four corners in CCW order
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            ([0.0, 1.0, 0.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
            ([1.0, 0.0, 0.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
        ];

        let mut mesh = Self::with_capacity(12);
        for (n, quad) in faces {
            let v = quad.map(|[x, y, z]| Vertex::new(x, y, z, n[0], n[1], n[2]));
            mesh.add_triangle(Triangle::new(v[0], v[1], v[2]));
            mesh.add_triangle(Triangle::new(v[0], v[2], v[3]));
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_normals_point_outward() {
        let mut mesh = Mesh::cube(2.0);
        mesh.compute_normals();
        assert_eq!(mesh.triangles.len(), 12);
        for triangle in &mesh.triangles {
            let centroid = triangle
                .vertices
                .iter()
                .fold(Vector3::zeros(), |acc, v| acc + v.position.coords)
                / 3.0;
            assert!(triangle.normal.dot(&centroid) > 0.0);
            for vertex in &triangle.vertices {
                assert_eq!(vertex.normal, triangle.normal);
            }
        }
    }

    #[test]
    fn test_degenerate_triangle_has_zero_normal() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let triangle = Triangle::new(Vertex::at(p), Vertex::at(p), Vertex::at(p));
        assert_eq!(triangle.normal, Vector3::zeros());
    }

    #[test]
    fn test_bounding_box_and_center() {
        let mut mesh = Mesh::new();
        mesh.add_triangle(Triangle::new(
            Vertex::at(Point3::new(10.0, 20.0, 30.0)),
            Vertex::at(Point3::new(12.0, 20.0, 30.0)),
            Vertex::at(Point3::new(10.0, 24.0, 36.0)),
        ));

        let bounds = mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.extents(), Vector3::new(2.0, 4.0, 6.0));
        assert_relative_eq!(bounds.max_extent(), 6.0);

        let offset = mesh.center();
        assert_relative_eq!(offset, Vector3::new(-11.0, -22.0, -33.0));
        let centered = mesh.bounding_box().unwrap();
        assert_relative_eq!(centered.center(), Point3::origin());
        assert_relative_eq!(centered.extents(), Vector3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        let mut mesh = Mesh::new();
        assert!(mesh.bounding_box().is_none());
        assert_eq!(mesh.center(), Vector3::zeros());
    }
}
