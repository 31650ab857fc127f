//! Camera seam.
//!
//! Renderers draw into a pass the application has already begun, using the
//! matrices of whatever [`Camera`] is active. The frustum test is derived
//! from those matrices unless a camera overrides it.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};

/// Projection and view matrices plus the viewport they render into.
pub trait Camera {
    fn projection_matrix(&self) -> Matrix4<f32>;

    fn view_matrix(&self) -> Matrix4<f32>;

    /// Width and height of the viewport in pixels.
    fn viewport(&self) -> (u32, u32);

    fn sphere_in_frustum(&self, centre: Vector3<f32>, radius: f32) -> bool {
        Frustum::from_matrix(self.projection_matrix() * self.view_matrix())
            .contains_sphere(centre, radius)
    }
}

/// The six clip planes of a view-projection matrix, normals pointing inwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vector4<f32>; 6],
}

impl Frustum {
    pub fn from_matrix(m: Matrix4<f32>) -> Self {
        let row = |i: usize| Vector4::new(m.x[i], m.y[i], m.z[i], m.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2].map(|p| {
            let length = p.truncate().magnitude();
            if length > 0.0 { p / length } else { p }
        });
        Self { planes }
    }

    pub fn contains_sphere(&self, centre: Vector3<f32>, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(centre) + p.w >= -radius)
    }
}

/// Scene matrices as the particle shaders read them.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl SceneUniform {
    pub fn from_camera(camera: &dyn Camera) -> Self {
        Self {
            projection: camera.projection_matrix().into(),
            view: camera.view_matrix().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Point3, perspective};

    use super::*;

    struct Fixed;

    impl Camera for Fixed {
        fn projection_matrix(&self) -> Matrix4<f32> {
            perspective(Deg(90.0), 1.0, 0.1, 100.0)
        }

        fn view_matrix(&self) -> Matrix4<f32> {
            Matrix4::look_at_rh(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0), Vector3::unit_y())
        }

        fn viewport(&self) -> (u32, u32) {
            (800, 800)
        }
    }

    #[test]
    fn sphere_in_front_is_visible() {
        assert!(Fixed.sphere_in_frustum(Vector3::new(0.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn sphere_behind_is_culled() {
        assert!(!Fixed.sphere_in_frustum(Vector3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn radius_reaches_into_frustum() {
        // 90 degree fov: at depth 10 the side plane is at x = 10.
        let centre = Vector3::new(11.0, 0.0, -10.0);
        assert!(!Fixed.sphere_in_frustum(centre, 0.5));
        assert!(Fixed.sphere_in_frustum(centre, 1.4));
    }
}
