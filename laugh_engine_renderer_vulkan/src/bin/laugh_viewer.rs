//! Windowed viewer: loads a scene from an asset root and renders it with Vulkan
//!
//! Usage: `laugh_viewer [asset_root]`
//!
//! Meshes need a decoder, which the engine leaves to the application, so the
//! viewer shows the environment skybox. Space cycles display modes, arrow keys
//! orbit, the mouse wheel zooms and Escape quits.

use laugh_engine::laugh::{run_windowed, Engine, RendererConfig};
use laugh_engine::laugh::log::LogSeverity;
use laugh_engine::laugh::scene::{FsAssetLoader, SceneDesc};
use laugh_engine::{engine_error, engine_info};
use laugh_engine_renderer_vulkan::laugh::{print_validation_stats_report, VulkanDevice};
use std::path::PathBuf;
use std::sync::Arc;
use winit::window::Window;

fn main() {
    Engine::set_min_severity(LogSeverity::Info);

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets"));

    let config = RendererConfig {
        app_name: "Laugh Viewer".to_string(),
        asset_dir: root.join("precomputed"),
        shader_dir: root.join("shaders"),
        ..RendererConfig::default()
    };
    let validation = config.enable_validation;
    let scene = SceneDesc::from_model_names(&root, &[]);

    engine_info!("laugh::Viewer", "Loading scene from {}", root.display());
    let result = run_windowed(
        config,
        Box::new(FsAssetLoader::new()),
        scene,
        Box::new(|window: &Arc<Window>, config: &RendererConfig| VulkanDevice::new(window.as_ref(), config)),
    );

    if validation {
        print_validation_stats_report();
    }
    if let Err(e) = result {
        engine_error!("laugh::Viewer", "{}", e);
        std::process::exit(1);
    }
}
