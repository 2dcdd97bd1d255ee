use glam::{Mat4, Vec3, Vec4};
use super::*;

fn assert_vec3_near(a: Vec3, b: Vec3) {
    assert!(a.abs_diff_eq(b, 1e-4), "{:?} != {:?}", a, b);
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_camera_for_extent() {
    let camera = Camera::for_extent(1920, 1080);
    assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    assert_eq!(camera.target, Vec3::ZERO);
    assert_eq!(camera.up, Vec3::Y);
}

#[test]
fn test_zero_height_does_not_divide_by_zero() {
    let camera = Camera::for_extent(640, 0);
    assert!(camera.aspect.is_finite());
}

// ============================================================================
// Matrices
// ============================================================================

#[test]
fn test_view_matrix_puts_target_ahead() {
    let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
    let target = camera.view_matrix().transform_point3(Vec3::ZERO);
    assert_vec3_near(target, Vec3::new(0.0, 0.0, -5.0));
}

#[test]
fn test_projection_flips_y_and_maps_depth_to_unit_range() {
    let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, 1.0);
    let projection = camera.projection_matrix();
    let up = projection * Vec4::new(0.0, 1.0, -1.0, 1.0);
    assert!(up.y / up.w < 0.0);

    let near = projection * Vec4::new(0.0, 0.0, -camera.near, 1.0);
    let far = projection * Vec4::new(0.0, 0.0, -camera.far, 1.0);
    assert!((near.z / near.w).abs() < 1e-5);
    assert!((far.z / far.w - 1.0).abs() < 1e-5);
}

#[test]
fn test_view_projection_matrix() {
    let camera = Camera::for_extent(800, 600);
    let expected: Mat4 = camera.projection_matrix() * camera.view_matrix();
    assert_eq!(camera.view_projection_matrix(), expected);
}

// ============================================================================
// Movement
// ============================================================================

#[test]
fn test_orbit_keeps_distance() {
    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 1.0);
    camera.orbit(std::f32::consts::FRAC_PI_2, 0.0);
    assert_vec3_near(camera.position, Vec3::new(3.0, 0.0, 0.0));

    camera.orbit(0.0, 10.0);
    assert!((camera.position.length() - 3.0).abs() < 1e-4);
    assert!(camera.position.y < 3.0);
}

#[test]
fn test_zoom_never_passes_target() {
    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 1.0);
    camera.zoom(1.0);
    assert_vec3_near(camera.position, Vec3::new(0.0, 0.0, 2.0));
    camera.zoom(100.0);
    assert!(camera.position.z > 0.0);
}

#[test]
fn test_set_extent_updates_aspect() {
    let mut camera = Camera::for_extent(100, 100);
    camera.set_extent(200, 100);
    assert_eq!(camera.aspect, 2.0);
}
