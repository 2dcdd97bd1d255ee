//! Unit tests for the debug messenger callback
//!
//! The callback is driven directly with hand-built callback data; no GPU or
//! validation layer needed. Tests share the global config, hence `#[serial]`.

use super::*;
use serial_test::serial;
use std::path::PathBuf;

fn config(severity: DebugSeverity, output: DebugOutput) -> Config {
    Config {
        severity,
        output,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        panic_on_error: false,
        enable_stats: true,
    }
}

fn emit(severity: vk::DebugUtilsMessageSeverityFlagsEXT, message_type: vk::DebugUtilsMessageTypeFlagsEXT, message: &CStr) {
    let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
        .message_id_name(c"VUID-test")
        .message(message);
    unsafe {
        vulkan_debug_callback(severity, message_type, &data, std::ptr::null_mut());
    }
}

fn temp_log(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("laugh_debug_{}_{}.log", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

// ============================================================================
// FILTER TESTS
// ============================================================================

#[test]
fn test_severity_flags_per_level() {
    let errors = config(DebugSeverity::ErrorsOnly, DebugOutput::Console);
    assert_eq!(errors.severity_flags(), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);

    let all = config(DebugSeverity::All, DebugOutput::Console);
    assert!(all.severity_flags().contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

#[test]
fn test_general_messages_hidden_by_default() {
    let config = config(DebugSeverity::All, DebugOutput::Console);
    assert!(config.shows_category(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
    assert!(config.shows_category(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
    assert!(!config.shows_category(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL));
}

// ============================================================================
// CALLBACK TESTS
// ============================================================================

#[test]
#[serial]
fn test_callback_counts_by_severity() {
    let path = temp_log("counts");
    init_debug_config(config(DebugSeverity::All, DebugOutput::File(path.clone())));

    emit(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"bad layout");
    emit(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE, c"slow path");
    emit(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE, c"slow path");

    let stats = get_validation_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 2);
    assert_eq!(stats.total(), 3);
    cleanup_debug_config();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[VULKAN ERROR] [Validation]"));
    assert!(written.contains("[×2]"));
    let _ = std::fs::remove_file(&path);
}

#[test]
#[serial]
fn test_filtered_messages_are_not_counted() {
    let path = temp_log("filtered");
    init_debug_config(config(DebugSeverity::ErrorsOnly, DebugOutput::File(path.clone())));

    emit(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"ignored");
    emit(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, c"ignored too");

    assert_eq!(get_validation_stats().total(), 0);
    assert!(!path.exists());
    cleanup_debug_config();
}

#[test]
#[serial]
fn test_callback_without_config_is_silent() {
    init_debug_config(config(DebugSeverity::All, DebugOutput::Console));
    cleanup_debug_config();

    emit(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"late message");
    assert_eq!(get_validation_stats().errors, 0);
}

#[test]
#[serial]
fn test_init_resets_statistics() {
    init_debug_config(config(DebugSeverity::All, DebugOutput::File(temp_log("reset"))));
    emit(vk::DebugUtilsMessageSeverityFlagsEXT::INFO, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"hello");
    assert_eq!(get_validation_stats().info, 1);

    init_debug_config(config(DebugSeverity::All, DebugOutput::Console));
    assert_eq!(get_validation_stats(), ValidationStats::default());
    cleanup_debug_config();
    let _ = std::fs::remove_file(temp_log("reset"));
}
