//! Shadow-mapping configuration and the light-space projection.

use glam::{Mat4, Vec3};

use crate::camera::Camera;

/// Settings for the shadow depth pre-pass.
///
/// The shadow pass renders scene depth from `light_perspective` through a
/// symmetric orthographic projection, producing the map sampled during
/// light accumulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowView {
    /// How strongly occluded fragments are darkened, in `[0, 1]`.
    pub intensity: f32,
    /// The light's point of view.
    pub light_perspective: Camera,
    /// Near plane of the orthographic projection.
    pub near_plane: f32,
    /// Far plane of the orthographic projection.
    pub far_plane: f32,
    /// Half-extent of the orthographic frustum on both axes, in world
    /// units. Larger values cover more of the scene at lower resolution.
    pub perspective_scale: f32,
}

impl Default for ShadowView {
    fn default() -> Self {
        Self {
            intensity: 0.7,
            light_perspective: Camera::new(
                Vec3::ZERO,
                Vec3::new(0.0, -64.0, -64.0),
                Vec3::Y,
            ),
            near_plane: 0.02,
            far_plane: 7000.0,
            perspective_scale: 512.0,
        }
    }
}

impl ShadowView {
    /// The matrix taking world-space positions into light clip space:
    /// `projection * view`, with the view a look-at from the light.
    pub fn light_space_matrix(&self) -> Mat4 {
        let s = self.perspective_scale;
        let projection =
            Mat4::orthographic_rh(-s, s, -s, s, self.near_plane, self.far_plane);
        let view = self.light_perspective.view_matrix();
        projection * view
    }

    /// Normalized direction the shadow light shines along.
    pub fn light_direction(&self) -> Vec3 {
        self.light_perspective.forward()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_values() {
        let view = ShadowView::default();
        assert_relative_eq!(view.intensity, 0.7);
        assert_eq!(view.light_perspective.position, Vec3::ZERO);
        assert_eq!(view.light_perspective.target, Vec3::new(0.0, -64.0, -64.0));
        assert_eq!(view.light_perspective.up, Vec3::Y);
        assert_relative_eq!(view.near_plane, 0.02);
        assert_relative_eq!(view.far_plane, 7000.0);
    }

    #[test]
    fn light_space_centers_the_view_axis() {
        // A point straight down the light axis projects to the clip-space
        // center with depth inside [0, 1].
        let view = ShadowView::default();
        let along = view.light_perspective.position + view.light_direction() * 50.0;
        let clip = view.light_space_matrix().project_point3(along);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn points_behind_the_light_fall_outside_depth_range() {
        let view = ShadowView::default();
        let behind = view.light_perspective.position - view.light_direction() * 10.0;
        let clip = view.light_space_matrix().project_point3(behind);
        assert!(clip.z < 0.0);
    }
}
