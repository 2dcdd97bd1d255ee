//! Unit tests for the uniform blob

use glam::{Mat4, Vec3, Vec4};

use crate::config::{default_lights, DisplayMode, NUM_LIGHTS};
use crate::device::mock_device::MockDevice;
use crate::device::*;
use crate::error::Error;
use crate::uniform_blob::*;

// ============================================================================
// ALLOCATION
// ============================================================================

#[test]
fn test_offsets_respect_alignment() {
    let mut blob = UniformBlob::new(4096, 256);
    let a = blob.allocate(4).unwrap();
    let b = blob.allocate(100).unwrap();
    let c = blob.allocate(1).unwrap();
    assert_eq!((a, b, c), (0, 256, 512));
    assert_eq!(blob.used(), 513);
}

#[test]
fn test_offsets_are_stable_and_disjoint() {
    let mut blob = UniformBlob::new(64 * 1024, 64);
    let transforms = blob.allocate_for::<Transforms>().unwrap();
    let lighting = blob.allocate_for::<LightingParams>().unwrap();
    let display = blob.allocate_for::<DisplayInfo>().unwrap();

    assert!(transforms.offset() + transforms.size() <= lighting.offset());
    assert!(lighting.offset() + lighting.size() <= display.offset());

    blob.write(display, &DisplayInfo::new(DisplayMode::Normal, (800, 600)));
    blob.write(transforms, &Transforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ONE));
    assert_eq!(blob.read(display).display_mode, DisplayMode::Normal as u32);
    assert_eq!(blob.read(transforms).eye_position, Vec4::new(1.0, 1.0, 1.0, 1.0));
}

#[test]
fn test_exhaustion_is_allocation_error() {
    let mut blob = UniformBlob::new(512, 256);
    blob.allocate(200).unwrap();
    blob.allocate(200).unwrap();
    assert!(matches!(blob.allocate(1), Err(Error::AllocationError(_))));
}

// ============================================================================
// UPLOAD
// ============================================================================

#[test]
fn test_upload_copies_used_prefix() {
    let mut device = MockDevice::new(64, 64);
    let buffer = device
        .create_buffer(&BufferDesc { size: 1024, usage: BufferUsage::UNIFORM, location: MemoryLocation::CpuToGpu })
        .unwrap();

    let mut blob = UniformBlob::new(1024, 256);
    let display = blob.allocate_for::<DisplayInfo>().unwrap();
    let model = blob.allocate_for::<PerModelData>().unwrap();
    blob.write(model, &PerModelData::new(Mat4::from_scale(Vec3::splat(2.0))));
    blob.upload(&mut device, buffer).unwrap();

    let contents = &device.buffers[buffer].1;
    let at = model.offset() as usize;
    assert_eq!(&contents[at..at + 64], bytemuck::bytes_of(&Mat4::from_scale(Vec3::splat(2.0))));
    assert_eq!(display.descriptor(buffer), DescriptorResource::UniformBuffer { buffer, offset: 0, range: 16 });
}

// ============================================================================
// STRUCTURES
// ============================================================================

#[test]
fn test_structure_sizes() {
    assert_eq!(std::mem::size_of::<CubeViews>(), 7 * 64);
    assert_eq!(std::mem::size_of::<Transforms>(), 3 * 64 + 16);
    assert_eq!(std::mem::size_of::<LightData>(), 32);
    assert_eq!(std::mem::size_of::<LightingParams>(), 16 + 32 * NUM_LIGHTS);
    assert_eq!(std::mem::size_of::<DisplayInfo>(), 16);
}

#[test]
fn test_normal_matrix_is_inverse_transpose() {
    let model = Mat4::from_scale(Vec3::new(2.0, 4.0, 8.0));
    let data = PerModelData::new(model);
    assert!(data.normal.abs_diff_eq(Mat4::from_scale(Vec3::new(0.5, 0.25, 0.125)), 1e-6));
}

#[test]
fn test_cube_views_look_along_axes() {
    let views = CubeViews::from_origin();
    // +X face: a point on +X ends up straight ahead (negative view-space z)
    let ahead = views.views[0].transform_point3(Vec3::X);
    assert!(ahead.z < 0.0 && ahead.x.abs() < 1e-6 && ahead.y.abs() < 1e-6);
    let light = LightData::from(default_lights()[0]);
    assert_eq!(light.radius, default_lights()[0].radius);
}

#[test]
fn test_shared_uniforms_start_with_cube_views() {
    let mut blob = UniformBlob::new(64 * 1024, 256);
    let shared = SharedUniforms::allocate(&mut blob).unwrap();
    assert_eq!(shared.cube_views.offset(), 0);
    assert_eq!(blob.read(shared.cube_views), CubeViews::from_origin());
    assert_eq!(shared.display.offset() % 256, 0);
}
