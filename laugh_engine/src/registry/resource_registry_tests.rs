//! Unit tests for the resource registry

use crate::device::mock_device::MockDevice;
use crate::device::*;
use crate::error::Error;
use crate::registry::*;

fn registry_at(device: &mut MockDevice, w: u32, h: u32) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry.create_attachments(device, (w, h)).unwrap();
    registry
}

// ============================================================================
// ATTACHMENTS
// ============================================================================

#[test]
fn test_attachments_created_with_formats_and_usage() {
    let mut device = MockDevice::new(1920, 1080);
    let registry = registry_at(&mut device, 1920, 1080);

    let depth = registry.attachment(AttachmentSlot::Depth).unwrap();
    assert_eq!(depth.desc.format, Format::D32_SFLOAT);
    assert!(depth.desc.usage.contains(ImageUsage::INPUT_ATTACHMENT | ImageUsage::DEPTH_STENCIL_ATTACHMENT));

    let gb3 = registry.attachment(AttachmentSlot::GBuffer3).unwrap();
    assert_eq!(gb3.desc.format, Format::R8G8B8A8_UNORM);
    assert_eq!(gb3.layout, ImageLayout::Undefined);

    let post = registry.attachment(AttachmentSlot::PostEffect1).unwrap();
    assert_eq!(post.desc.format, Format::R16G16B16A16_SFLOAT);
    assert!(!post.desc.usage.contains(ImageUsage::INPUT_ATTACHMENT));

    assert_eq!(registry.image_count(), AttachmentSlot::ALL.len());
}

#[test]
fn test_depth_format_falls_back() {
    let mut device = MockDevice::new(64, 64);
    device.unsupported_formats = vec![Format::D32_SFLOAT, Format::D32_SFLOAT_S8_UINT];
    let registry = registry_at(&mut device, 64, 64);
    assert_eq!(registry.depth_format().unwrap(), Format::D24_UNORM_S8_UINT);
}

#[test]
fn test_allocation_failure_is_allocation_error() {
    let mut device = MockDevice::new(64, 64);
    device.fail_allocations_after(2);
    let mut registry = ResourceRegistry::new();

    match registry.create_attachments(&mut device, (64, 64)) {
        Err(Error::AllocationError(msg)) => assert!(msg.contains("gbuffer2")),
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

// ============================================================================
// RESIZE
// ============================================================================

#[test]
fn test_repeated_resize_leaves_one_image_per_slot() {
    let mut device = MockDevice::new(800, 600);
    let mut registry = registry_at(&mut device, 800, 600);
    let ids: Vec<ImageId> = AttachmentSlot::ALL.iter().map(|s| registry.attachment_id(*s).unwrap()).collect();
    let baseline = device.live_counts();

    let sizes = [(1024, 768), (640, 480), (1920, 1080), (333, 222)];
    for size in sizes {
        registry.resize(&mut device, size).unwrap();
    }

    assert_eq!(device.live_counts(), baseline);
    for (slot, id) in AttachmentSlot::ALL.iter().zip(ids) {
        let entry = registry.attachment(*slot).unwrap();
        assert_eq!(registry.attachment_id(*slot).unwrap(), id);
        assert_eq!((entry.desc.width, entry.desc.height), (333, 222));
        assert_eq!(entry.generation, sizes.len() as u32);
        assert_eq!(device.images[entry.image].desc.width, 333);
    }
    assert!(device.validation_errors.is_empty());
}

#[test]
fn test_resize_keeps_precomputed_maps() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = registry_at(&mut device, 64, 64);
    let brdf = registry.create_precomputed(&mut device, PrecomputedSlot::BrdfLut).unwrap();
    let before = registry.image(brdf).unwrap().image;

    registry.resize(&mut device, (128, 128)).unwrap();

    let after = registry.image(brdf).unwrap();
    assert_eq!(after.image, before);
    assert_eq!(after.generation, 0);
}

#[test]
fn test_resize_resets_layout() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = registry_at(&mut device, 64, 64);
    let id = registry.attachment_id(AttachmentSlot::LightingResult).unwrap();
    registry.set_layout(id, ImageLayout::ShaderReadOnly).unwrap();

    registry.resize(&mut device, (32, 32)).unwrap();
    assert_eq!(registry.image(id).unwrap().layout, ImageLayout::Undefined);
}

// ============================================================================
// PRECOMPUTED MAPS
// ============================================================================

#[test]
fn test_specular_map_has_view_per_mip() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = ResourceRegistry::new();
    registry.create_precomputed(&mut device, PrecomputedSlot::SpecularIrradiance).unwrap();

    let specular = registry.precomputed(PrecomputedSlot::SpecularIrradiance).unwrap();
    assert_eq!(specular.desc.mip_levels, 9);
    assert_eq!(specular.views.len(), 10);
    let level3 = device.image_views[specular.layer_view(3).unwrap()].desc;
    assert_eq!(level3.range.base_mip, 3);
    assert_eq!(level3.range.layer_count, 6);
    assert_eq!(device.image_views[specular.default_view()].desc.view_type, ImageViewType::Cube);
}

#[test]
fn test_loaded_map_keeps_file_mips_and_is_readable() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = ResourceRegistry::new();
    let data = ImageData {
        width: 16,
        height: 16,
        format: Format::R32G32B32A32_SFLOAT,
        mip_levels: 3,
        array_layers: 6,
        is_cube: true,
        bytes: vec![7; expected_image_size(16, 16, Format::R32G32B32A32_SFLOAT, 3, 6)],
    };

    let id = registry.load_precomputed(&mut device, PrecomputedSlot::SpecularIrradiance, &data).unwrap();
    let entry = registry.image(id).unwrap();
    assert_eq!(entry.desc.mip_levels, 3);
    assert_eq!(entry.layout, ImageLayout::ShaderReadOnly);
    assert_eq!(device.images[entry.image].contents.as_deref(), Some(data.bytes.as_slice()));
}

#[test]
fn test_precomputed_slot_cannot_be_created_twice() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = ResourceRegistry::new();
    registry.create_precomputed(&mut device, PrecomputedSlot::BrdfLut).unwrap();
    assert!(registry.create_precomputed(&mut device, PrecomputedSlot::BrdfLut).is_err());
}

#[test]
fn test_transition_follows_tracked_layout() {
    let mut device = MockDevice::new(64, 64);
    let mut registry = ResourceRegistry::new();
    let id = registry.create_precomputed(&mut device, PrecomputedSlot::BrdfLut).unwrap();
    registry.set_layout(id, ImageLayout::General).unwrap();
    device
        .transition_image_layout(registry.image(id).unwrap().image, SubresourceRange::full(1, 1), ImageLayout::Undefined, ImageLayout::General)
        .unwrap();

    registry.transition(&mut device, id, ImageLayout::ShaderReadOnly).unwrap();

    assert_eq!(registry.image(id).unwrap().layout, ImageLayout::ShaderReadOnly);
    assert!(device.validation_errors.is_empty());
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[test]
fn test_destroy_all_releases_everything() {
    let mut device = MockDevice::new(64, 64);
    let baseline = device.live_counts();
    let mut registry = registry_at(&mut device, 64, 64);
    registry.create_precomputed(&mut device, PrecomputedSlot::DiffuseIrradiance).unwrap();
    registry
        .create_buffer(&mut device, "uniforms", BufferDesc { size: 256, usage: BufferUsage::UNIFORM, location: MemoryLocation::CpuToGpu })
        .unwrap();

    registry.destroy_all(&mut device);

    assert_eq!(device.live_counts(), baseline);
    assert!(device.validation_errors.is_empty());
}
