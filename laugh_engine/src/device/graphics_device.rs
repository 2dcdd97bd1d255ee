/// GraphicsDevice trait - the device layer consumed by the renderer core
///
/// One implementation per backend (Vulkan) plus a recording test device. All
/// objects are referenced through arena handles; the device owns the native
/// objects and destroys whatever is still alive when it is dropped.
///
/// Every call is made from the single render thread, in submission order.

use crate::error::Result;
use crate::device::*;

pub trait GraphicsDevice {
    // ===== QUERIES =====

    /// Limits the core depends on (uniform offset alignment, push constant size)
    fn limits(&self) -> DeviceLimits;

    /// First format of `candidates` supporting `feature` with optimal tiling
    fn find_supported_format(&self, candidates: &[Format], feature: FormatFeature) -> Result<Format>;

    // ===== IMAGES =====

    /// Allocate a device-local image, left in `ImageLayout::Undefined`
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle>;
    fn destroy_image(&mut self, image: ImageHandle);
    fn create_image_view(&mut self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle>;
    fn destroy_image_view(&mut self, view: ImageViewHandle);
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle>;
    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    /// Copy tightly packed data into every mip/layer, leaving the image in `final_layout`
    fn upload_image(&mut self, image: ImageHandle, data: &ImageData, final_layout: ImageLayout) -> Result<()>;

    /// Read every mip/layer back to the host; the image must be in `TransferSrc`
    fn read_image(&mut self, image: ImageHandle) -> Result<ImageData>;

    /// Immediate one-shot layout transition (blocks until done)
    fn transition_image_layout(
        &mut self,
        image: ImageHandle,
        range: SubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()>;

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;

    /// Map, copy `data` at `offset`, unmap (staged for device-local buffers)
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // ===== RENDER PASSES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle>;
    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle);
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle>;
    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle);

    /// Allocate from the device's pool (grown on exhaustion)
    fn allocate_descriptor_set(&mut self, layout: DescriptorSetLayoutHandle) -> Result<DescriptorSetHandle>;
    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()>;
    fn free_descriptor_set(&mut self, set: DescriptorSetHandle);

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&mut self, desc: &ShaderModuleDesc) -> Result<ShaderModuleHandle>;
    fn destroy_shader_module(&mut self, module: ShaderModuleHandle);

    /// Bindings and push constant size declared by a shader module
    fn shader_interface(&self, module: ShaderModuleHandle) -> Result<ShaderInterface>;

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;
    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle);
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle>;
    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> Result<PipelineHandle>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // ===== SYNCHRONIZATION =====

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle>;
    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle>;
    fn destroy_fence(&mut self, fence: FenceHandle);
    fn wait_for_fence(&mut self, fence: FenceHandle, timeout_ns: u64) -> Result<()>;
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()>;

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle>;
    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle);
    fn begin_command_buffer(&mut self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()>;
    fn record(&mut self, command_buffer: CommandBufferHandle, command: &Command) -> Result<()>;
    fn end_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()>;
    fn submit(&mut self, submit: &SubmitInfo) -> Result<()>;

    // ===== SWAPCHAIN =====

    fn swapchain_info(&self) -> SwapchainInfo;

    /// Rebuild the swap chain for the surface's current size; old handles become invalid
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<SwapchainInfo>;

    /// Returns `Err` only for fatal failures; out-of-date surfaces are a result
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquireResult>;
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus>;

    // ===== LIFETIME =====

    /// Block until every queue is idle
    fn wait_idle(&mut self) -> Result<()>;
}

/// Record a whole sequence of commands
pub fn record_all(
    device: &mut dyn GraphicsDevice,
    command_buffer: CommandBufferHandle,
    commands: &[Command],
) -> Result<()> {
    for command in commands {
        device.record(command_buffer, command)?;
    }
    Ok(())
}
