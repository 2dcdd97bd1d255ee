//! End-to-end lifecycle tests on the mock device

use crate::assets::{AssetLoader, MemoryAssetLoader};
use crate::config::{DisplayMode, RendererConfig};
use crate::device::mock_device::{MockDevice, MockEvent};
use crate::device::*;
use crate::engine::Engine;
use crate::error::Error;
use crate::log::{LogEntry, LogSeverity, Logger};
use crate::registry::{AttachmentSlot, PrecomputedSlot};
use crate::renderer::*;
use crate::test_support::{insert_precomputed_files, scene_loader, test_scene};
use serial_test::serial;
use std::sync::{Arc, Mutex};

fn config(width: u32, height: u32) -> RendererConfig {
    RendererConfig { width, height, ..Default::default() }
}

/// Renderer over a mock device, plus a handle on the loader's shared file table
fn renderer(width: u32, height: u32, precomputed_on_disk: bool) -> (DeferredRenderer<MockDevice>, MemoryAssetLoader) {
    let config = config(width, height);
    let desc = test_scene();
    let loader = scene_loader(&config, &desc, true);
    if precomputed_on_disk {
        insert_precomputed_files(&loader, &config);
    }
    let device = MockDevice::new(width, height);
    (DeferredRenderer::new(device, config, Box::new(loader.clone()), desc), loader)
}

fn ready(width: u32, height: u32, precomputed_on_disk: bool) -> (DeferredRenderer<MockDevice>, MemoryAssetLoader) {
    let (mut renderer, loader) = renderer(width, height, precomputed_on_disk);
    renderer.initialize().unwrap();
    renderer.precompute().unwrap();
    (renderer, loader)
}

fn assert_clean(device: &MockDevice) {
    assert!(device.validation_errors.is_empty(), "{:?}", device.validation_errors);
}

// ============================================================================
// SCENARIO A: PRECOMPUTED MAPS ON DISK
// ============================================================================

#[test]
fn test_loaded_maps_skip_precomputation() {
    let (mut renderer, _loader) = ready(1920, 1080, true);
    assert!(renderer.plan().is_empty());
    assert!(renderer.device().submissions.is_empty());

    let registry = renderer.registry().unwrap();
    for slot in PrecomputedSlot::ALL {
        assert_eq!(registry.precomputed(slot).unwrap().layout, ImageLayout::ShaderReadOnly);
    }

    renderer.render_frame().unwrap();
    let device = renderer.device();
    assert_eq!(device.submissions.len(), 3);
    assert!(device.submissions_to(QueueKind::Compute).is_empty());
    assert!(matches!(device.events.last(), Some(MockEvent::Present(0, PresentStatus::Presented))));
    let presented = device.swapchain_info().images[0];
    assert_eq!(device.images[presented].layout, ImageLayout::PresentSrc);
    assert_eq!(renderer.frames_presented(), 1);
    assert_clean(device);
}

// ============================================================================
// SCENARIO B: PRECOMPUTED MAPS ABSENT
// ============================================================================

#[test]
fn test_missing_maps_are_computed_then_saved() {
    let (mut renderer, loader) = ready(320, 240, false);
    let plan = renderer.plan();
    assert!(plan.compute_brdf && plan.compute_diffuse && plan.compute_specular);

    {
        let device = renderer.device();
        assert_eq!(device.submissions_to(QueueKind::Compute).len(), 1);
        assert_eq!(device.submissions_to(QueueKind::Graphics).len(), 1);
        assert!(device.submissions.iter().all(|s| s.fence.is_some()));
        // precompute pipelines, sets and buffers are gone again
        assert_eq!(device.live_counts().pipelines, 7);
        assert_eq!(device.live_counts().fences, 0);
    }

    renderer.render_frame().unwrap();
    let config = renderer.config().clone();
    for slot in PrecomputedSlot::ALL {
        assert!(loader.file(&config.asset_path(slot.file_name())).is_none());
    }

    renderer.teardown().unwrap();
    for slot in PrecomputedSlot::ALL {
        assert!(loader.file(&config.asset_path(slot.file_name())).is_some(), "{} not saved", slot.name());
    }
    assert_clean(renderer.device());
}

#[test]
fn test_saved_maps_reload_byte_identical() {
    let (mut first, loader) = ready(320, 240, false);
    first.render_frame().unwrap();
    first.teardown().unwrap();

    let config = config(320, 240);
    let desc = test_scene();
    let mut second = DeferredRenderer::new(MockDevice::new(320, 240), config.clone(), Box::new(loader.clone()), desc);
    second.initialize().unwrap();
    second.precompute().unwrap();
    assert!(second.plan().is_empty());
    assert!(second.device().submissions.is_empty());

    for slot in PrecomputedSlot::ALL {
        let saved = loader.load_texture(&config.asset_path(slot.file_name())).unwrap();
        let image = second.registry().unwrap().precomputed(slot).unwrap().image;
        assert_eq!(second.device().images[image].contents.as_ref(), Some(&saved.bytes), "{}", slot.name());
    }
}

// ============================================================================
// SCENARIO C: RESIZE
// ============================================================================

#[test]
fn test_resize_recreates_attachments() {
    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.render_frame().unwrap();
    let images_before = renderer.device().live_counts().images;

    renderer.resize(640, 480).unwrap();
    {
        let device = renderer.device();
        assert!(device.events.contains(&MockEvent::RecreateSwapchain(640, 480)));
        assert_eq!(device.live_counts().images, images_before);
        let registry = renderer.registry().unwrap();
        assert_eq!(registry.extent(), (640, 480));
        for slot in AttachmentSlot::ALL {
            let image = registry.attachment(slot).unwrap();
            assert_eq!((image.desc.width, image.desc.height), (640, 480), "{}", slot.name());
            assert_eq!(image.generation, 1);
        }
    }

    renderer.render_frame().unwrap();
    assert_eq!(renderer.frames_presented(), 2);
    assert!((renderer.camera().aspect - 640.0 / 480.0).abs() < 1e-6);
    assert_clean(renderer.device());
}

#[test]
fn test_repeated_resizes_keep_one_image_per_slot() {
    let (mut renderer, _loader) = ready(320, 240, true);
    let images_before = renderer.device().live_counts().images;
    for (width, height) in [(400, 300), (800, 600), (256, 256)] {
        renderer.resize(width, height).unwrap();
        renderer.render_frame().unwrap();
    }
    assert_eq!(renderer.device().live_counts().images, images_before);
    assert_eq!(renderer.registry().unwrap().attachment(AttachmentSlot::Depth).unwrap().generation, 3);
    assert_clean(renderer.device());
}

#[test]
fn test_out_of_date_surface_is_recovered() {
    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.device_mut().script_acquire(AcquireResult::OutOfDate);

    renderer.render_frame().unwrap();
    assert!(renderer.device().events.contains(&MockEvent::RecreateSwapchain(320, 240)));
    assert!(renderer.device().submissions.is_empty());

    renderer.render_frame().unwrap();
    assert_eq!(renderer.device().submissions.len(), 3);
    assert_clean(renderer.device());
}

fn recreations(device: &MockDevice) -> usize {
    device.events.iter().filter(|e| matches!(e, MockEvent::RecreateSwapchain(..))).count()
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.resize(0, 240).unwrap();
    assert_eq!(recreations(renderer.device()), 0);
}

#[test]
fn test_minimized_window_skips_frames_until_resized() {
    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.resize(0, 0).unwrap();
    assert!(renderer.is_suspended());

    renderer.render_frame().unwrap();
    renderer.render_frame().unwrap();
    assert!(renderer.device().submissions.is_empty());
    assert_eq!(recreations(renderer.device()), 0);

    renderer.resize(400, 300).unwrap();
    assert!(!renderer.is_suspended());
    renderer.render_frame().unwrap();
    assert_eq!(renderer.device().submissions.len(), 3);
    assert_eq!(renderer.registry().unwrap().extent(), (400, 300));
    assert_clean(renderer.device());
}

#[test]
fn test_out_of_date_with_empty_surface_suspends_frames() {
    let (mut renderer, _loader) = ready(320, 240, true);
    let before = renderer.device().live_counts();
    renderer.device_mut().surface_extent = Some((0, 0));
    renderer.device_mut().script_acquire(AcquireResult::OutOfDate);

    renderer.render_frame().unwrap();
    assert!(renderer.is_suspended());
    assert_eq!(recreations(renderer.device()), 0);
    assert_eq!(renderer.registry().unwrap().extent(), (320, 240));
    assert_eq!(renderer.device().live_counts(), before);

    // Still no area: nothing is submitted or rebuilt
    renderer.render_frame().unwrap();
    assert!(renderer.device().submissions.is_empty());

    renderer.device_mut().surface_extent = None;
    renderer.render_frame().unwrap();
    assert!(!renderer.is_suspended());
    assert_eq!(recreations(renderer.device()), 1);
    assert_eq!(renderer.device().submissions.len(), 3);
    assert_clean(renderer.device());
}

// ============================================================================
// STEADY STATE
// ============================================================================

#[test]
fn test_each_frame_submits_three_chained_buffers() {
    let (mut renderer, _loader) = ready(320, 240, true);
    for _ in 0..3 {
        renderer.render_frame().unwrap();
    }
    let device = renderer.device();
    assert_eq!(device.submissions.len(), 9);
    for frame in device.submissions.chunks(3) {
        assert!(frame.iter().all(|s| s.queue == QueueKind::Graphics));
        assert_eq!(frame[1].wait[0].semaphore, frame[0].signal[0]);
        assert_eq!(frame[2].wait[0].semaphore, frame[1].signal[0]);
    }
    // same geometry and post-effect buffers every frame
    assert_eq!(device.submissions[0].command_buffers, device.submissions[3].command_buffers);
    assert_eq!(device.submissions[1].command_buffers, device.submissions[4].command_buffers);
}

#[test]
fn test_display_mode_reaches_uniform_buffer() {
    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.set_display_mode(DisplayMode::Normal);
    renderer.render_frame().unwrap();

    let device = renderer.device();
    let uniform_buffers: Vec<&Vec<u8>> = device
        .buffers
        .values()
        .filter(|(desc, _)| desc.usage.contains(BufferUsage::UNIFORM))
        .map(|(_, bytes)| bytes)
        .collect();
    assert_eq!(uniform_buffers.len(), 1);
    let mode = DisplayMode::Normal as u32;
    let bytes = uniform_buffers[0];
    let found = bytes.chunks_exact(16).any(|chunk| {
        chunk[0..4] == mode.to_le_bytes() && chunk[4..8] == 320u32.to_le_bytes() && chunk[8..12] == 240u32.to_le_bytes()
    });
    assert!(found, "display info not uploaded");
}

#[test]
fn test_render_before_precompute_fails() {
    let (mut renderer, _loader) = renderer(320, 240, true);
    renderer.initialize().unwrap();
    assert!(matches!(renderer.render_frame(), Err(Error::InvalidResource(_))));
    renderer.teardown().unwrap();
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_run_frames_leaves_only_the_swap_chain() {
    let (mut renderer, _loader) = renderer(320, 240, false);
    run_frames(&mut renderer, 3).unwrap();

    let device = renderer.device();
    let counts = device.live_counts();
    let swapchain_images = device.swapchain_info().image_count();
    assert_eq!(counts.images, swapchain_images);
    assert_eq!(counts.image_views, swapchain_images);
    assert_eq!(counts.total(), 2 * swapchain_images);
    assert!(device.events.contains(&MockEvent::WaitIdle));
    assert_clean(device);
    assert!(!renderer.is_ready());
}

#[test]
fn test_initialize_twice_fails() {
    let (mut renderer, _loader) = renderer(320, 240, true);
    renderer.initialize().unwrap();
    assert!(matches!(renderer.initialize(), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_allocation_failure_is_fatal() {
    let (mut renderer, _loader) = renderer(320, 240, true);
    renderer.device_mut().fail_allocations_after(2);
    let error = run_frames(&mut renderer, 1).unwrap_err();
    assert!(error.is_exhaustion(), "{:?}", error);
}

#[test]
fn test_teardown_without_initialize_is_noop() {
    let (mut renderer, _loader) = renderer(64, 64, true);
    renderer.teardown().unwrap();
    assert!(renderer.device().events.is_empty());
}

// ============================================================================
// LIFECYCLE LOGGING
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn logged(entries: &[LogEntry], source: &str, needle: &str) -> Option<LogSeverity> {
    entries
        .iter()
        .find(|e| e.source == source && e.message.contains(needle))
        .map(|e| e.severity)
}

#[test]
#[serial]
fn test_lifecycle_reports_each_stage() {
    Engine::reset_for_testing();
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });
    Engine::set_min_severity(LogSeverity::Trace);

    // Extents unique to this test; other tests may log concurrently
    let (mut renderer, _loader) = ready(328, 232, false);
    renderer.render_frame().unwrap();
    renderer.resize(408, 296).unwrap();
    renderer.resize(0, 0).unwrap();
    renderer.teardown().unwrap();

    let captured = entries.lock().unwrap().clone();
    Engine::reset_for_testing();

    assert_eq!(logged(&captured, "laugh::Assets", "will compute it"), Some(LogSeverity::Info));
    assert_eq!(logged(&captured, "laugh::Scheduler", "Precomputation finished (2 submissions)"), Some(LogSeverity::Info));
    assert_eq!(logged(&captured, "laugh::Renderer", "Steady state ready at 328x232"), Some(LogSeverity::Info));
    assert_eq!(logged(&captured, "laugh::Registry", "Resized attachments to 408x296"), Some(LogSeverity::Debug));
    assert_eq!(logged(&captured, "laugh::Renderer", "Surface recreated at 408x296"), Some(LogSeverity::Info));
    assert_eq!(logged(&captured, "laugh::Renderer", "Surface minimized (0x0)"), Some(LogSeverity::Debug));
    assert_eq!(logged(&captured, "laugh::Assets", "Saved"), Some(LogSeverity::Info));
    assert_eq!(logged(&captured, "laugh::Renderer", "Teardown complete"), Some(LogSeverity::Info));
    assert!(logged(&captured, "laugh::Renderer", "Computed maps not saved").is_none());

    let position = |needle: &str| captured.iter().position(|e| e.message.contains(needle)).unwrap();
    assert!(position("Steady state ready at 328x232") < position("Resized attachments to 408x296"));
    assert!(position("Resized attachments to 408x296") < position("Surface recreated at 408x296"));
}

#[test]
#[serial]
fn test_loaded_maps_are_reported_and_threshold_filters_debug() {
    Engine::reset_for_testing();
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });
    Engine::set_min_severity(LogSeverity::Info);

    let (mut renderer, _loader) = ready(320, 240, true);
    renderer.render_frame().unwrap();

    let captured = entries.lock().unwrap().clone();
    Engine::reset_for_testing();

    let loaded = captured.iter().filter(|e| e.source == "laugh::Assets" && e.message.starts_with("Loaded")).count();
    assert!(loaded >= PrecomputedSlot::ALL.len());
    assert!(logged(&captured, "laugh::Scheduler", "Nothing to precompute").is_none());
    assert!(logged(&captured, "laugh::Renderer", "Presented swap chain image").is_none());
    assert!(captured.iter().all(|e| e.severity >= LogSeverity::Info));
}
