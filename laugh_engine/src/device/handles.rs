/// Opaque handles for device objects
///
/// Every handle is a generational arena key: a destroyed object's handle never
/// aliases a later one, so stale handles are detected instead of silently
/// reusing someone else's object.

use slotmap::new_key_type;

new_key_type! {
    pub struct ImageHandle;
    pub struct ImageViewHandle;
    pub struct BufferHandle;
    pub struct SamplerHandle;
    pub struct RenderPassHandle;
    pub struct FramebufferHandle;
    pub struct DescriptorSetLayoutHandle;
    pub struct DescriptorSetHandle;
    pub struct PipelineLayoutHandle;
    pub struct PipelineHandle;
    pub struct ShaderModuleHandle;
    pub struct SemaphoreHandle;
    pub struct FenceHandle;
    pub struct CommandBufferHandle;
}
