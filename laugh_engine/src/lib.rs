/*!
# Laugh Engine

Core of a physically based deferred renderer with image-based lighting.

This crate is backend-agnostic: every GPU operation goes through the
[`GraphicsDevice`](laugh::device::GraphicsDevice) trait, implemented by the
Vulkan backend crate (and by an in-memory mock for the unit tests).

## Architecture

- **ResourceRegistry**: owns every render attachment and precomputed map
- **RenderPassGraph**: the five render passes and their framebuffers
- **Pipelines / DescriptorSets**: layouts, shader validation, pipelines, sets
- **Command sequencer**: records the precompute and steady-state command buffers
- **FrameScheduler**: fenced precompute and the semaphore-chained frame
- **DeferredRenderer**: the lifecycle orchestrator (initialize, precompute,
  frames, resize, teardown)
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod device;
pub mod registry;
pub mod render_graph;
pub mod pipeline;
pub mod assets;
pub mod uniform_blob;
pub mod camera;
pub mod scene;
pub mod sequencer;
pub mod scheduler;
pub mod renderer;
pub mod app;

#[cfg(test)]
pub mod test_support;

// Main laugh namespace module
pub mod laugh {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Lifecycle orchestrator and its drivers
    pub use crate::renderer::{run_frames, DeferredRenderer, RenderLifecycle};
    pub use crate::app::{run_windowed, DeviceFactory};
    pub use crate::config::RendererConfig;

    // Configuration, constants and debug messenger settings
    pub mod config {
        pub use crate::config::*;
    }

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device contract implemented by backends
    pub mod device {
        pub use crate::device::*;
    }

    // Renderer building blocks
    pub mod render {
        pub use crate::registry::*;
        pub use crate::render_graph::*;
        pub use crate::pipeline::*;
        pub use crate::sequencer::*;
        pub use crate::scheduler::*;
    }

    // Scene and asset collaborators
    pub mod scene {
        pub use crate::scene::*;
        pub use crate::camera::Camera;
        pub use crate::assets::*;
    }
}

// Re-export math library at crate root
pub use glam;
