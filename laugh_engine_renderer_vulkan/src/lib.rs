/*!
# Laugh Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` contract consumed by the
`laugh_engine` renderer core, built on ash and gpu-allocator.

```no_run
use laugh_engine::laugh::{run_windowed, RendererConfig};
use laugh_engine::laugh::scene::{FsAssetLoader, SceneDesc};
use laugh_engine_renderer_vulkan::laugh::VulkanDevice;
use std::path::Path;
use std::sync::Arc;
use winit::window::Window;

# fn main() -> laugh_engine::laugh::Result<()> {
let scene = SceneDesc::from_model_names(Path::new("assets"), &[]);
run_windowed(
    RendererConfig::default(),
    Box::new(FsAssetLoader::new()),
    scene,
    Box::new(|window: &Arc<Window>, config: &RendererConfig| VulkanDevice::new(window.as_ref(), config)),
)
# }
```
*/

mod debug;
mod vulkan_format;
mod vulkan_reflection;
mod vulkan_swapchain;
mod vulkan_device;
mod vulkan_resources;
mod vulkan_pipeline;
mod vulkan_command;

pub mod laugh {
    pub use crate::vulkan_device::VulkanDevice;
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
