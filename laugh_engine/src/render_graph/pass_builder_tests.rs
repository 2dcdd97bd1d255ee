//! Unit tests for the render pass graph and framebuffers

use crate::device::mock_device::MockDevice;
use crate::device::*;
use crate::registry::*;
use crate::render_graph::*;

fn setup(w: u32, h: u32) -> (MockDevice, ResourceRegistry, RenderPassGraph) {
    let mut device = MockDevice::new(w, h);
    let mut registry = ResourceRegistry::new();
    registry.create_attachments(&mut device, (w, h)).unwrap();
    let format = device.swapchain_info().format;
    let graph = RenderPassGraph::build(&mut device, &registry, format).unwrap();
    (device, registry, graph)
}

// ============================================================================
// PASS TABLES
// ============================================================================

#[test]
fn test_every_pass_table_validates() {
    for kind in PassKind::ALL {
        let desc = pass_desc(kind, Format::D32_SFLOAT, Format::B8G8R8A8_SRGB);
        assert!(desc.validate().is_ok(), "{} failed validation", kind.name());
        assert_eq!(kind.clear_values().len(), if kind == PassKind::BloomMerge { 0 } else { desc.attachments.len() });
    }
}

#[test]
fn test_lighting_subpass_reads_are_covered_by_dependency() {
    let desc = geometry_lighting_pass_desc(Format::D32_SFLOAT);
    let dep = desc
        .dependencies
        .iter()
        .find(|d| d.src_subpass == 0 && d.dst_subpass == 1)
        .unwrap();

    assert!(dep.src_stage.contains(
        PipelineStage::COLOR_ATTACHMENT_OUTPUT | PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS
    ));
    assert!(dep.dst_stage.contains(
        PipelineStage::FRAGMENT_SHADER | PipelineStage::COLOR_ATTACHMENT_OUTPUT | PipelineStage::EARLY_FRAGMENT_TESTS
    ));
    assert!(dep.src_access.contains(Access::COLOR_ATTACHMENT_WRITE | Access::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert!(dep.dst_access.contains(Access::INPUT_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE));

    // Every input attachment of subpass 1 is written by subpass 0
    let writer = &desc.subpasses[0];
    for input in &desc.subpasses[1].input_attachments {
        let written = writer.color_attachments.iter().any(|r| r.attachment == input.attachment)
            || writer.depth_attachment.map(|r| r.attachment) == Some(input.attachment);
        assert!(written, "attachment {} read without a writer", input.attachment);
    }
}

#[test]
fn test_dropping_subpass_dependency_fails_validation() {
    let mut desc = geometry_lighting_pass_desc(Format::D32_SFLOAT);
    desc.dependencies.retain(|d| !(d.src_subpass == 0 && d.dst_subpass == 1));
    assert!(desc.validate().is_err());
}

#[test]
fn test_sampled_attachments_end_readable() {
    let desc = geometry_lighting_pass_desc(Format::D32_SFLOAT);
    assert_eq!(desc.attachments[0].final_layout, ImageLayout::DepthStencilReadOnly);
    for attachment in &desc.attachments[1..] {
        assert_eq!(attachment.final_layout, ImageLayout::ShaderReadOnly);
    }
    assert_eq!(final_pass_desc(Format::B8G8R8A8_UNORM).attachments[0].final_layout, ImageLayout::PresentSrc);
}

#[test]
fn test_bloom_merge_loads_lighting_result() {
    let desc = bloom_merge_pass_desc();
    assert_eq!(desc.attachments[0].load_op, LoadOp::Load);
    assert_eq!(desc.attachments[0].initial_layout, ImageLayout::ShaderReadOnly);
    assert_eq!(bloom_clear_pass_desc().attachments[0].load_op, LoadOp::Clear);
}

// ============================================================================
// GRAPH
// ============================================================================

#[test]
fn test_build_creates_all_passes() {
    let (device, _registry, graph) = setup(640, 480);
    assert_eq!(device.live_counts().render_passes, PassKind::ALL.len());
    for kind in PassKind::ALL {
        assert!(graph.handle(kind).is_ok());
    }
}

#[test]
fn test_rebuild_only_touches_changed_formats() {
    let (mut device, registry, mut graph) = setup(640, 480);
    let geometry = graph.handle(PassKind::GeometryLighting).unwrap();

    let same = graph.rebuild_changed(&mut device, &registry, Format::B8G8R8A8_UNORM).unwrap();
    assert!(same.is_empty());

    let changed = graph.rebuild_changed(&mut device, &registry, Format::B8G8R8A8_SRGB).unwrap();
    assert_eq!(changed, vec![PassKind::Final]);
    assert_eq!(graph.handle(PassKind::GeometryLighting).unwrap(), geometry);
    assert_eq!(device.live_counts().render_passes, PassKind::ALL.len());
}

#[test]
fn test_apply_final_layouts() {
    let (_device, mut registry, graph) = setup(64, 64);
    graph.apply_final_layouts(PassKind::GeometryLighting, &mut registry).unwrap();
    graph.apply_final_layouts(PassKind::BloomClear, &mut registry).unwrap();

    assert_eq!(registry.attachment(AttachmentSlot::Depth).unwrap().layout, ImageLayout::DepthStencilReadOnly);
    assert_eq!(registry.attachment(AttachmentSlot::GBuffer2).unwrap().layout, ImageLayout::ShaderReadOnly);
    assert_eq!(registry.attachment(AttachmentSlot::PostEffect1).unwrap().layout, ImageLayout::ShaderReadOnly);
}

// ============================================================================
// FRAMEBUFFERS
// ============================================================================

#[test]
fn test_steady_framebuffers_attachment_order() {
    let (mut device, registry, graph) = setup(800, 600);
    let swapchain = device.swapchain_info();
    let framebuffers = SteadyFramebuffers::create(&mut device, &registry, &graph, &swapchain).unwrap();

    let geometry = &device.framebuffers[framebuffers.geometry].desc;
    let expected: Vec<_> = PassKind::GeometryLighting
        .attachment_slots()
        .iter()
        .map(|s| registry.attachment(*s).unwrap().default_view())
        .collect();
    assert_eq!(geometry.attachments, expected);
    assert_eq!((geometry.width, geometry.height), (800, 600));

    let lighting = &device.framebuffers[framebuffers.bloom(BloomTarget::Lighting)].desc;
    assert_eq!(lighting.render_pass, graph.handle(PassKind::BloomMerge).unwrap());
    assert_eq!(framebuffers.present.len(), swapchain.image_count());

    framebuffers.destroy(&mut device);
    assert_eq!(device.live_counts().framebuffers, 0);
}

#[test]
fn test_prefilter_framebuffers_per_mip() {
    let (mut device, mut registry, graph) = setup(64, 64);
    registry.create_precomputed(&mut device, PrecomputedSlot::DiffuseIrradiance).unwrap();
    registry.create_precomputed(&mut device, PrecomputedSlot::SpecularIrradiance).unwrap();

    let targets = PrefilterFramebuffers::create(&mut device, &registry, &graph, true, true).unwrap();

    assert_eq!(targets.diffuse.unwrap().size, 32);
    let sizes: Vec<u32> = targets.specular.iter().map(|t| t.size).collect();
    assert_eq!(sizes, vec![256, 128, 64, 32, 16, 8, 4, 2, 1]);
    assert!(targets.specular.iter().all(|t| device.framebuffers[t.framebuffer].desc.layers == 6));
}
