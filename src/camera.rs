//! Perspective camera, orbit controls around a target, and zoom-to-extents.
//!
//! Z is up, as in the CAD models the solver produces.

use std::f32::consts::PI;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::scene::Scene;

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    /// Vertical field of view, degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Point3::new(1.0, -1.0, 1.5),
            fov: 60.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    /// Clip planes are clamped so `far > near > 0` even for degenerate fits.
    pub fn projection(&self) -> Matrix4<f32> {
        let near = self.near.max(MIN_NEAR);
        let far = self.far.max(near * 2.0);
        Matrix4::new_perspective(self.aspect.max(1e-6), self.fov.to_radians(), near, far)
    }

    pub fn view(&self, target: &Point3<f32>) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, target, &Vector3::z())
    }
}

/// Orbit / pan / dolly around `target`. Input accumulates between frames and
/// is applied by `update`.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pending_rotate: (f32, f32),
    pending_pan: Vector3<f32>,
    pending_scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Point3::origin(),
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_speed: 0.01,
            pending_rotate: (0.0, 0.0),
            pending_pan: Vector3::zeros(),
            pending_scale: 1.0,
        }
    }
}

const MIN_POLAR: f32 = 1e-3;
const MIN_NEAR: f32 = 1e-4;
/// Extent framed when every object collapses to a single point.
const MIN_FIT_SIZE: f32 = 1.0;

impl OrbitControls {
    /// Drag in screen pixels: x spins around Z, y tilts.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_rotate.0 += dx * self.rotate_speed;
        self.pending_rotate.1 += dy * self.rotate_speed;
    }

    /// Drag in screen pixels, moved in the camera's view plane.
    pub fn pan(&mut self, camera: &PerspectiveCamera, dx: f32, dy: f32, viewport_height: f32) {
        let offset = camera.position - self.target;
        let distance = offset.norm();
        if distance <= f32::EPSILON || viewport_height <= 0.0 {
            return;
        }
        // world units per pixel at the target's depth
        let scale = 2.0 * distance * (camera.fov.to_radians() * 0.5).tan() / viewport_height;
        let forward = -offset / distance;
        let Some(right) = forward.cross(&Vector3::z()).try_normalize(f32::EPSILON) else {
            return;
        };
        let up = right.cross(&forward);
        self.pending_pan += (-right * dx + up * dy) * scale;
    }

    /// Scroll amount; positive moves closer.
    pub fn dolly(&mut self, scroll: f32) {
        self.pending_scale *= (-scroll * 0.002).exp();
    }

    pub fn has_pending(&self) -> bool {
        self.pending_rotate != (0.0, 0.0)
            || self.pending_pan != Vector3::zeros()
            || self.pending_scale != 1.0
    }

    /// Applies accumulated input to the camera. No-op without input.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        if !self.has_pending() {
            return;
        }
        let offset = camera.position - self.target;
        self.target += self.pending_pan;

        let radius = offset.norm().max(f32::EPSILON);
        let mut azimuth = offset.y.atan2(offset.x);
        let mut polar = (offset.z / radius).clamp(-1.0, 1.0).acos();

        azimuth -= self.pending_rotate.0;
        polar = (polar - self.pending_rotate.1).clamp(MIN_POLAR, PI - MIN_POLAR);
        let radius = (radius * self.pending_scale).clamp(self.min_distance.max(1e-4), self.max_distance);

        let dir = Vector3::new(polar.sin() * azimuth.cos(), polar.sin() * azimuth.sin(), polar.cos());
        camera.position = self.target + dir * radius;

        self.pending_rotate = (0.0, 0.0);
        self.pending_pan = Vector3::zeros();
        self.pending_scale = 1.0;
    }
}

/// Viewing direction of the default camera, used when it sits on its target.
fn fallback_direction() -> Vector3<f32> {
    Vector3::new(-1.0, 1.0, -1.5).normalize()
}

/// Moves the camera so every non-light object fits in view with `fit_offset`
/// margin, keeping the current viewing direction. Returns false when the
/// scene has nothing to frame.
pub fn fit_camera_to_objects(
    camera: &mut PerspectiveCamera,
    controls: &mut OrbitControls,
    scene: &Scene,
    fit_offset: f32,
) -> bool {
    let bounds = scene.object_bounds();
    if bounds.is_empty() {
        return false;
    }

    let size = bounds.size();
    let center = bounds.center();

    let mut max_size = size.x.max(size.y).max(size.z);
    if max_size.is_nan() || max_size <= 0.0 {
        max_size = MIN_FIT_SIZE;
    }
    let fit_height_distance = max_size / (2.0 * (PI * camera.fov / 360.0).atan());
    let fit_width_distance = fit_height_distance / camera.aspect;
    let distance = fit_offset * fit_height_distance.max(fit_width_distance);

    let direction = (controls.target - camera.position)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(fallback_direction)
        * distance;

    controls.max_distance = distance * 10.0;
    controls.target = center;

    camera.near = distance / 100.0;
    camera.far = distance * 100.0;
    camera.position = controls.target - direction;

    controls.update(camera);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeKind, SceneNode};

    fn close(a: &Point3<f32>, b: &Point3<f32>) -> bool {
        (a - b).norm() < 1e-4
    }

    fn box_scene(min: [f32; 3], max: [f32; 3]) -> Scene {
        let mut scene = Scene::default();
        let node = SceneNode::new(NodeKind::Line {
            points: vec![Point3::from(min), Point3::from(max)],
        });
        scene.replace_objects(node);
        scene
    }

    #[test]
    fn empty_scene_leaves_camera_alone() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let before = camera.clone();
        assert!(!fit_camera_to_objects(&mut camera, &mut controls, &Scene::default(), 1.2));
        assert_eq!(camera, before);
    }

    #[test]
    fn fit_centres_target_and_sets_clip_planes() {
        let scene = box_scene([-10.0, -5.0, 0.0], [10.0, 5.0, 4.0]);
        let mut camera = PerspectiveCamera { aspect: 2.0, ..Default::default() };
        let mut controls = OrbitControls::default();
        assert!(fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2));

        assert!(close(&controls.target, &Point3::new(0.0, 0.0, 2.0)));
        let fit_height = 20.0 / (2.0 * (PI * 60.0 / 360.0).atan());
        let distance = 1.2 * fit_height;
        assert!(((camera.position - controls.target).norm() - distance).abs() < 1e-3);
        assert!((camera.near - distance / 100.0).abs() < 1e-5);
        assert!((camera.far - distance * 100.0).abs() < 1e-2);
        assert!((controls.max_distance - distance * 10.0).abs() < 1e-3);
    }

    #[test]
    fn fit_keeps_view_direction() {
        let scene = box_scene([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let before = (controls.target - camera.position).normalize();
        fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2);
        let after = (controls.target - camera.position).normalize();
        assert!((before - after).norm() < 1e-5);
    }

    #[test]
    fn narrow_viewport_uses_width_distance() {
        let scene = box_scene([0.0, 0.0, 0.0], [4.0, 4.0, 4.0]);
        let mut wide = PerspectiveCamera { aspect: 2.0, ..Default::default() };
        let mut tall = PerspectiveCamera { aspect: 0.5, ..Default::default() };
        fit_camera_to_objects(&mut wide, &mut OrbitControls::default(), &scene, 1.2);
        let mut controls = OrbitControls::default();
        fit_camera_to_objects(&mut tall, &mut controls, &scene, 1.2);
        let d_wide = (wide.position - Point3::new(2.0, 2.0, 2.0)).norm();
        let d_tall = (tall.position - controls.target).norm();
        assert!((d_tall - 2.0 * d_wide).abs() < 1e-3);
    }

    #[test]
    fn fitting_twice_is_stable() {
        let scene = box_scene([-3.0, 2.0, 0.0], [8.0, 9.0, 6.0]);
        let mut camera = PerspectiveCamera { aspect: 16.0 / 9.0, ..Default::default() };
        let mut controls = OrbitControls::default();
        fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2);
        let (pos, target) = (camera.position, controls.target);
        fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2);
        assert!(close(&camera.position, &pos));
        assert!(close(&controls.target, &target));
    }

    #[test]
    fn camera_on_target_uses_fallback() {
        let scene = box_scene([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let mut camera = PerspectiveCamera { position: Point3::origin(), ..Default::default() };
        let mut controls = OrbitControls::default();
        fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2);
        assert!(camera.position.iter().all(|c| c.is_finite()));
        assert!(!close(&camera.position, &controls.target));
    }

    #[test]
    fn single_point_scene_still_projects() {
        let scene = box_scene([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        assert!(fit_camera_to_objects(&mut camera, &mut controls, &scene, 1.2));
        assert!(camera.near > 0.0);
        assert!(camera.far > camera.near);
        assert!(!close(&camera.position, &controls.target));

        let mvp = camera.projection() * camera.view(&controls.target);
        assert!(mvp.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn projection_tolerates_collapsed_clip_planes() {
        let camera = PerspectiveCamera { near: 0.0, far: 0.0, ..Default::default() };
        assert!(camera.projection().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn update_without_input_is_identity() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let before = camera.clone();
        controls.update(&mut camera);
        assert_eq!(camera, before);
    }

    #[test]
    fn orbit_keeps_distance_and_dolly_respects_max() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls { max_distance: 3.0, ..Default::default() };
        let radius = (camera.position - controls.target).norm();

        controls.rotate(40.0, -15.0);
        controls.update(&mut camera);
        assert!(((camera.position - controls.target).norm() - radius).abs() < 1e-4);
        assert!(!controls.has_pending());

        controls.dolly(-5000.0);
        controls.update(&mut camera);
        assert!(((camera.position - controls.target).norm() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let offset = camera.position - controls.target;
        let old_target = controls.target;
        controls.pan(&camera, 30.0, 10.0, 600.0);
        controls.update(&mut camera);
        assert!(!close(&controls.target, &old_target));
        assert!(((camera.position - controls.target) - offset).norm() < 1e-4);
    }
}
