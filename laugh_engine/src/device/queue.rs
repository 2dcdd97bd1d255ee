/// Queue submission, swap chain and device capability types

use crate::device::{
    CommandBufferHandle, FenceHandle, Format, ImageHandle, ImageViewHandle, PipelineStage,
    SemaphoreHandle,
};

/// Which hardware queue receives a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Compute,
}

/// Command buffer usage contract passed at `begin_command_buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferUsage {
    /// Recorded once, submitted once
    OneTimeSubmit,
    /// Recorded once, may be pending on the GPU several times at once
    SimultaneousUse,
}

/// Semaphore wait of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreWait {
    pub semaphore: SemaphoreHandle,
    pub stage: PipelineStage,
}

/// One queue submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitInfo {
    pub queue: QueueKind,
    pub command_buffers: Vec<CommandBufferHandle>,
    pub wait: Vec<SemaphoreWait>,
    pub signal: Vec<SemaphoreHandle>,
    /// Signaled when the submission retires
    pub fence: Option<FenceHandle>,
}

/// Outcome of `acquire_next_image`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image ready; `suboptimal` means the surface still works but should be rebuilt
    Ready { image_index: u32, suboptimal: bool },
    /// The surface changed and the swap chain must be recreated before use
    OutOfDate,
}

/// Outcome of `present`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentStatus::Presented)
    }
}

/// Current swap chain shape
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainInfo {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub images: Vec<ImageHandle>,
    /// One color view per swap chain image
    pub image_views: Vec<ImageViewHandle>,
}

impl SwapchainInfo {
    pub fn image_count(&self) -> usize {
        self.image_views.len()
    }
}

/// Device limits the core depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Alignment of dynamic/offset uniform buffer bindings
    pub min_uniform_buffer_offset_alignment: u64,
    pub max_push_constants_size: u32,
    /// Whether a separate compute queue family exists
    pub has_async_compute: bool,
}
