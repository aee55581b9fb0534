//! View frustum culling for axis-aligned bounding boxes
//!
//! The frustum is described by six inward-facing planes. A box survives when
//! it lies at least partially on the inner side of every plane, tested by
//! projecting its half extents onto each plane normal.

use crate::foundation::math::{utils::deg_to_rad, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box from a centre and half extents
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Centre of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half width, half height and half depth
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vec3,
    distance: f32,
}

impl Plane {
    fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: point.dot(&normal),
        }
    }

    fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }

    fn has_on_forward_side(&self, aabb: &Aabb) -> bool {
        let half = aabb.half_extents();
        let radius = half.x * self.normal.x.abs() + half.y * self.normal.y.abs() + half.z * self.normal.z.abs();
        -radius <= self.signed_distance(&aabb.center())
    }
}

/// Direction a camera with the given yaw and pitch (in degrees) looks at.
///
/// Yaw 0 and pitch 0 look down the negative Z axis.
pub fn forward_vector(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (deg_to_rad(yaw), deg_to_rad(pitch));
    let yaw_damper = pitch.cos().abs();
    Vec3::new(yaw.sin() * yaw_damper, pitch.sin(), -yaw.cos() * yaw_damper)
}

/// Perspective view frustum
#[derive(Debug, Clone)]
pub struct FrustumCuller {
    // near, far, left, right, bottom, top
    planes: [Plane; 6],
}

impl FrustumCuller {
    /// Build the frustum of a camera described by yaw and pitch in degrees
    pub fn from_yaw_pitch(
        camera_position: Vec3,
        yaw: f32,
        pitch: f32,
        aspect_ratio: f32,
        fov: f32,
        near_plane: f32,
        far_plane: f32,
    ) -> Self {
        Self::new(
            camera_position,
            forward_vector(yaw, pitch),
            forward_vector(yaw, pitch + 90.0),
            aspect_ratio,
            fov,
            near_plane,
            far_plane,
        )
    }

    /// Build the frustum of a camera from explicit front and up directions.
    ///
    /// `fov` is the vertical field of view in degrees.
    pub fn new(
        camera_position: Vec3,
        front: Vec3,
        up: Vec3,
        aspect_ratio: f32,
        fov: f32,
        near_plane: f32,
        far_plane: f32,
    ) -> Self {
        let half_vertical_side = far_plane * (deg_to_rad(fov) * 0.5).tan();
        let half_horizontal_side = half_vertical_side * aspect_ratio;
        let front_times_far = front * far_plane;
        let right = front.cross(&up);

        let near_face = Plane::from_point_normal(camera_position + front * near_plane, front);
        let far_face = Plane::from_point_normal(camera_position + front_times_far, -front);

        let right_edge = front_times_far + right * half_horizontal_side;
        let left_edge = front_times_far - right * half_horizontal_side;
        let top_edge = front_times_far + up * half_vertical_side;
        let bottom_edge = front_times_far - up * half_vertical_side;

        let left_face = Plane::from_point_normal(camera_position, left_edge.cross(&up));
        let right_face = Plane::from_point_normal(camera_position, up.cross(&right_edge));
        let bottom_face = Plane::from_point_normal(camera_position, right.cross(&bottom_edge));
        let top_face = Plane::from_point_normal(camera_position, top_edge.cross(&right));

        Self {
            planes: [near_face, far_face, left_face, right_face, bottom_face, top_face],
        }
    }

    /// Whether the box is entirely outside the frustum
    pub fn should_cull_aabb(&self, aabb: &Aabb) -> bool {
        !self.planes.iter().all(|plane| plane.has_on_forward_side(aabb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::from_center(Vec3::new(x, y, z), Vec3::new(1.0, 1.0, 1.0))
    }

    fn default_culler() -> FrustumCuller {
        FrustumCuller::from_yaw_pitch(Vec3::zeros(), 0.0, 0.0, 16.0 / 9.0, 70.0, 0.1, 100.0)
    }

    #[test]
    fn test_forward_vector() {
        let forward = forward_vector(0.0, 0.0);
        assert_relative_eq!(forward, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);

        let right = forward_vector(90.0, 0.0);
        assert_relative_eq!(right, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);

        let up = forward_vector(0.0, 90.0);
        assert_relative_eq!(up, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_aabb_geometry() {
        let aabb = Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, 2.0, 4.0));
        assert_relative_eq!(aabb.center(), Vec3::new(1.0, 1.0, 3.0));
        assert_relative_eq!(aabb.half_extents(), Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn test_box_in_front_is_kept() {
        let culler = default_culler();
        assert!(!culler.should_cull_aabb(&unit_box(0.0, 0.0, -10.0)));
        assert!(!culler.should_cull_aabb(&unit_box(2.0, -1.0, -50.0)));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let culler = default_culler();
        assert!(culler.should_cull_aabb(&unit_box(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let culler = default_culler();
        assert!(culler.should_cull_aabb(&unit_box(0.0, 0.0, -200.0)));
        // Straddling the far plane still counts as visible
        assert!(!culler.should_cull_aabb(&unit_box(0.0, 0.0, -100.5)));
    }

    #[test]
    fn test_box_outside_side_planes_is_culled() {
        let culler = default_culler();
        assert!(culler.should_cull_aabb(&unit_box(50.0, 0.0, -10.0)));
        assert!(culler.should_cull_aabb(&unit_box(-50.0, 0.0, -10.0)));
        assert!(culler.should_cull_aabb(&unit_box(0.0, 30.0, -10.0)));
        assert!(culler.should_cull_aabb(&unit_box(0.0, -30.0, -10.0)));
    }

    #[test]
    fn test_wide_aspect_keeps_more_horizontally() {
        // tan(35 deg) * 10 is about 7, so x = 10 is only visible with a wide aspect
        let narrow = FrustumCuller::from_yaw_pitch(Vec3::zeros(), 0.0, 0.0, 1.0, 70.0, 0.1, 100.0);
        let wide = FrustumCuller::from_yaw_pitch(Vec3::zeros(), 0.0, 0.0, 2.0, 70.0, 0.1, 100.0);
        let aabb = unit_box(10.0, 0.0, -10.0);
        assert!(narrow.should_cull_aabb(&aabb));
        assert!(!wide.should_cull_aabb(&aabb));
    }

    #[test]
    fn test_rotated_and_translated_camera() {
        let culler = FrustumCuller::from_yaw_pitch(Vec3::new(100.0, 5.0, 0.0), 90.0, 0.0, 1.0, 70.0, 0.1, 100.0);
        assert!(!culler.should_cull_aabb(&unit_box(120.0, 5.0, 0.0)));
        assert!(culler.should_cull_aabb(&unit_box(80.0, 5.0, 0.0)));
        assert!(culler.should_cull_aabb(&unit_box(0.0, 0.0, -10.0)));
    }
}
