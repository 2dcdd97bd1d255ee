/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Records every object, every recorded command and every submission. Command
/// buffers are "executed" at submit time: render pass begin/end and barriers
/// update the tracked layout of each image, and any mismatch between a tracked
/// layout and the layout a pass or transition expects is collected in
/// `validation_errors`. Stale handles are reported the same way.

use std::collections::{HashMap, VecDeque};
use slotmap::{SlotMap, Key};

use crate::device::*;
use crate::error::{Error, Result};

// ============================================================================
// Recorded objects
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockImage {
    pub desc: ImageDesc,
    pub layout: ImageLayout,
    /// Last uploaded contents
    pub contents: Option<Vec<u8>>,
    pub swapchain: bool,
}

#[derive(Debug, Clone)]
pub struct MockImageView {
    pub image: ImageHandle,
    pub desc: ImageViewDesc,
}

#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    pub desc: FramebufferDesc,
}

#[derive(Debug, Clone)]
pub struct MockDescriptorSet {
    pub layout: DescriptorSetLayoutHandle,
    pub writes: Vec<DescriptorWrite>,
}

#[derive(Debug, Clone)]
pub enum MockPipeline {
    Graphics(GraphicsPipelineDesc),
    Compute(ComputePipelineDesc),
}

impl MockPipeline {
    pub fn name(&self) -> &str {
        match self {
            MockPipeline::Graphics(desc) => &desc.name,
            MockPipeline::Compute(desc) => &desc.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockCommandBuffer {
    pub queue: QueueKind,
    pub usage: Option<CommandBufferUsage>,
    pub recording: bool,
    pub submit_count: u32,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Copy)]
pub struct MockFence {
    pub signaled: bool,
}

/// Ordered device-level events
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Acquire(AcquireResult),
    /// Index into `MockDevice::submissions`
    Submit(usize),
    Present(u32, PresentStatus),
    RecreateSwapchain(u32, u32),
    WaitIdle,
}

/// Number of live objects per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockLiveCounts {
    pub images: usize,
    pub image_views: usize,
    pub buffers: usize,
    pub samplers: usize,
    pub render_passes: usize,
    pub framebuffers: usize,
    pub descriptor_set_layouts: usize,
    pub descriptor_sets: usize,
    pub pipeline_layouts: usize,
    pub pipelines: usize,
    pub shader_modules: usize,
    pub semaphores: usize,
    pub fences: usize,
    pub command_buffers: usize,
}

impl MockLiveCounts {
    pub fn total(&self) -> usize {
        self.images + self.image_views + self.buffers + self.samplers + self.render_passes
            + self.framebuffers + self.descriptor_set_layouts + self.descriptor_sets
            + self.pipeline_layouts + self.pipelines + self.shader_modules + self.semaphores
            + self.fences + self.command_buffers
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockDevice {
    pub images: SlotMap<ImageHandle, MockImage>,
    pub image_views: SlotMap<ImageViewHandle, MockImageView>,
    pub buffers: SlotMap<BufferHandle, (BufferDesc, Vec<u8>)>,
    pub samplers: SlotMap<SamplerHandle, SamplerDesc>,
    pub render_passes: SlotMap<RenderPassHandle, RenderPassDesc>,
    pub framebuffers: SlotMap<FramebufferHandle, MockFramebuffer>,
    pub set_layouts: SlotMap<DescriptorSetLayoutHandle, DescriptorSetLayoutDesc>,
    pub descriptor_sets: SlotMap<DescriptorSetHandle, MockDescriptorSet>,
    pub shader_modules: SlotMap<ShaderModuleHandle, ShaderModuleDesc>,
    pub pipeline_layouts: SlotMap<PipelineLayoutHandle, PipelineLayoutDesc>,
    pub pipelines: SlotMap<PipelineHandle, MockPipeline>,
    pub semaphores: SlotMap<SemaphoreHandle, ()>,
    pub fences: SlotMap<FenceHandle, MockFence>,
    pub command_buffers: SlotMap<CommandBufferHandle, MockCommandBuffer>,

    /// Every submission, in order
    pub submissions: Vec<SubmitInfo>,
    pub events: Vec<MockEvent>,
    /// Layout mismatches, stale handles, misuse
    pub validation_errors: Vec<String>,

    /// Reflection results returned by `shader_interface`, keyed by shader name
    pub shader_interfaces: HashMap<String, ShaderInterface>,
    pub limits: DeviceLimits,
    /// Formats reported as unsupported by `find_supported_format`
    pub unsupported_formats: Vec<Format>,
    /// Size the surface dictates to swap chain recreation; `None` follows the request
    pub surface_extent: Option<(u32, u32)>,

    swapchain: SwapchainInfo,
    swapchain_image_count: u32,
    next_image: u32,
    acquire_script: VecDeque<AcquireResult>,
    present_script: VecDeque<PresentStatus>,
    allocations_before_failure: Option<usize>,
}

impl MockDevice {
    pub fn new(width: u32, height: u32) -> Self {
        let mut device = Self {
            images: SlotMap::with_key(),
            image_views: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            set_layouts: SlotMap::with_key(),
            descriptor_sets: SlotMap::with_key(),
            shader_modules: SlotMap::with_key(),
            pipeline_layouts: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            semaphores: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            command_buffers: SlotMap::with_key(),
            submissions: Vec::new(),
            events: Vec::new(),
            validation_errors: Vec::new(),
            shader_interfaces: HashMap::new(),
            limits: DeviceLimits {
                min_uniform_buffer_offset_alignment: 256,
                max_push_constants_size: 128,
                has_async_compute: true,
            },
            unsupported_formats: Vec::new(),
            surface_extent: None,
            swapchain: SwapchainInfo {
                format: Format::B8G8R8A8_UNORM,
                width: 0,
                height: 0,
                images: Vec::new(),
                image_views: Vec::new(),
            },
            swapchain_image_count: 3,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            allocations_before_failure: None,
        };
        device.build_swapchain(width, height);
        device
    }

    // ===== SCRIPTING =====

    /// Make the next acquisitions report the given results (before normal behavior resumes)
    pub fn script_acquire(&mut self, result: AcquireResult) {
        self.acquire_script.push_back(result);
    }

    /// Make the next presents report the given statuses
    pub fn script_present(&mut self, status: PresentStatus) {
        self.present_script.push_back(status);
    }

    /// Let `count` more image/buffer allocations succeed, then fail with OutOfMemory
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocations_before_failure = Some(count);
    }

    pub fn set_shader_interface(&mut self, shader_name: &str, interface: ShaderInterface) {
        self.shader_interfaces.insert(shader_name.to_string(), interface);
    }

    // ===== INSPECTION =====

    pub fn live_counts(&self) -> MockLiveCounts {
        MockLiveCounts {
            images: self.images.len(),
            image_views: self.image_views.len(),
            buffers: self.buffers.len(),
            samplers: self.samplers.len(),
            render_passes: self.render_passes.len(),
            framebuffers: self.framebuffers.len(),
            descriptor_set_layouts: self.set_layouts.len(),
            descriptor_sets: self.descriptor_sets.len(),
            pipeline_layouts: self.pipeline_layouts.len(),
            pipelines: self.pipelines.len(),
            shader_modules: self.shader_modules.len(),
            semaphores: self.semaphores.len(),
            fences: self.fences.len(),
            command_buffers: self.command_buffers.len(),
        }
    }

    /// Recorded commands of a command buffer (empty if unknown)
    pub fn commands(&self, command_buffer: CommandBufferHandle) -> &[Command] {
        self.command_buffers
            .get(command_buffer)
            .map(|cb| cb.commands.as_slice())
            .unwrap_or(&[])
    }

    pub fn submissions_to(&self, queue: QueueKind) -> Vec<&SubmitInfo> {
        self.submissions.iter().filter(|s| s.queue == queue).collect()
    }

    /// Name of the pipeline behind a handle (for recording-order assertions)
    pub fn pipeline_name(&self, pipeline: PipelineHandle) -> Option<&str> {
        self.pipelines.get(pipeline).map(|p| p.name())
    }

    /// Image behind a view
    pub fn view_image(&self, view: ImageViewHandle) -> Option<&MockImage> {
        self.image_views.get(view).and_then(|v| self.images.get(v.image))
    }

    /// Size of the non-swapchain images currently alive
    pub fn attachment_extents(&self) -> Vec<(u32, u32)> {
        self.images
            .values()
            .filter(|i| !i.swapchain)
            .map(|i| (i.desc.width, i.desc.height))
            .collect()
    }

    // ===== INTERNALS =====

    fn build_swapchain(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.validation_errors.push(format!("swap chain with empty extent {}x{}", width, height));
        }
        for view in self.swapchain.image_views.drain(..) {
            self.image_views.remove(view);
        }
        for image in self.swapchain.images.drain(..) {
            self.images.remove(image);
        }

        let format = self.swapchain.format;
        for _ in 0..self.swapchain_image_count {
            let desc = ImageDesc::new_2d(width, height, format, ImageUsage::COLOR_ATTACHMENT);
            let image = self.images.insert(MockImage {
                desc,
                layout: ImageLayout::Undefined,
                contents: None,
                swapchain: true,
            });
            let view = self.image_views.insert(MockImageView {
                image,
                desc: ImageViewDesc {
                    view_type: ImageViewType::D2,
                    format,
                    aspect: ImageAspect::Color,
                    range: SubresourceRange::full(1, 1),
                },
            });
            self.swapchain.images.push(image);
            self.swapchain.image_views.push(view);
        }
        self.swapchain.width = width;
        self.swapchain.height = height;
        self.next_image = 0;
    }

    fn take_allocation(&mut self) -> Result<()> {
        match self.allocations_before_failure {
            Some(0) => Err(Error::OutOfMemory),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn error(&mut self, message: String) -> Error {
        self.validation_errors.push(message.clone());
        Error::InvalidResource(message)
    }

    fn remove_or_report<K: Key, V>(map: &mut SlotMap<K, V>, key: K, kind: &str, errors: &mut Vec<String>) {
        if map.remove(key).is_none() {
            errors.push(format!("destroy of unknown {} {:?}", kind, key));
        }
    }

    /// Deterministic texel pattern standing in for GPU-computed contents
    fn synthetic_contents(image: ImageHandle, size: usize) -> Vec<u8> {
        let seed = (image.data().as_ffi() & 0xff) as usize;
        (0..size).map(|i| ((i + seed) % 251) as u8).collect()
    }

    /// Apply a submitted command buffer's render passes and barriers to tracked layouts
    fn execute(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        let commands = match self.command_buffers.get(command_buffer) {
            Some(cb) => cb.commands.clone(),
            None => return Err(self.error(format!("submit of unknown command buffer {:?}", command_buffer))),
        };

        let mut active_pass: Option<(RenderPassDesc, Vec<ImageHandle>)> = None;
        for command in &commands {
            match command {
                Command::BeginRenderPass { render_pass, framebuffer, .. } => {
                    let Some(desc) = self.render_passes.get(*render_pass).cloned() else {
                        return Err(self.error(format!("stale render pass {:?}", render_pass)));
                    };
                    let Some(fb) = self.framebuffers.get(*framebuffer).cloned() else {
                        return Err(self.error(format!("stale framebuffer {:?}", framebuffer)));
                    };
                    let mut images = Vec::new();
                    for view in &fb.desc.attachments {
                        match self.image_views.get(*view).map(|v| v.image) {
                            Some(image) if self.images.contains_key(image) => images.push(image),
                            _ => return Err(self.error(format!("framebuffer references stale view {:?}", view))),
                        }
                    }
                    for (attachment, image) in desc.attachments.iter().zip(images.iter()) {
                        let current = self.images[*image].layout;
                        if attachment.initial_layout != ImageLayout::Undefined && attachment.initial_layout != current {
                            self.validation_errors.push(format!(
                                "{}: attachment expects {:?} but image is in {:?}",
                                desc.name, attachment.initial_layout, current
                            ));
                        }
                    }
                    active_pass = Some((desc, images));
                }
                Command::EndRenderPass => {
                    if let Some((desc, images)) = active_pass.take() {
                        for (attachment, image) in desc.attachments.iter().zip(images.iter()) {
                            self.images[*image].layout = attachment.final_layout;
                        }
                    } else {
                        self.validation_errors.push("EndRenderPass outside a render pass".to_string());
                    }
                }
                Command::BindPipeline { pipeline, .. } => {
                    if !self.pipelines.contains_key(*pipeline) {
                        return Err(self.error(format!("stale pipeline {:?}", pipeline)));
                    }
                }
                Command::BindDescriptorSets { sets, .. } => {
                    for set in sets {
                        if !self.descriptor_sets.contains_key(*set) {
                            return Err(self.error(format!("stale descriptor set {:?}", set)));
                        }
                    }
                }
                Command::BindVertexBuffer { buffer, .. } | Command::BindIndexBuffer { buffer, .. } => {
                    if !self.buffers.contains_key(*buffer) {
                        return Err(self.error(format!("stale buffer {:?}", buffer)));
                    }
                }
                Command::PipelineBarrier { images, .. } => {
                    for barrier in images {
                        let Some(image) = self.images.get_mut(barrier.image) else {
                            return Err(self.error(format!("barrier on stale image {:?}", barrier.image)));
                        };
                        if barrier.old_layout != ImageLayout::Undefined && barrier.old_layout != image.layout {
                            let message = format!(
                                "barrier expects {:?} but image is in {:?}",
                                barrier.old_layout, image.layout
                            );
                            self.validation_errors.push(message);
                        } else {
                            image.layout = barrier.new_layout;
                        }
                    }
                }
                _ => {}
            }
        }
        if active_pass.is_some() {
            self.validation_errors.push("command buffer ends inside a render pass".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// GraphicsDevice implementation
// ============================================================================

impl GraphicsDevice for MockDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn find_supported_format(&self, candidates: &[Format], _feature: FormatFeature) -> Result<Format> {
        candidates
            .iter()
            .copied()
            .find(|f| !self.unsupported_formats.contains(f))
            .ok_or_else(|| Error::InitializationFailed("no supported format".to_string()))
    }

    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle> {
        self.take_allocation()?;
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(self.error(format!("degenerate image {:?}", desc)));
        }
        Ok(self.images.insert(MockImage {
            desc: desc.clone(),
            layout: ImageLayout::Undefined,
            contents: None,
            swapchain: false,
        }))
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        Self::remove_or_report(&mut self.images, image, "image", &mut self.validation_errors);
    }

    fn create_image_view(&mut self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let Some(target) = self.images.get(image) else {
            return Err(self.error(format!("view of unknown image {:?}", image)));
        };
        let range = desc.range;
        if range.base_mip + range.mip_count > target.desc.mip_levels
            || range.base_layer + range.layer_count > target.desc.array_layers
        {
            return Err(self.error(format!("view range {:?} outside image", range)));
        }
        Ok(self.image_views.insert(MockImageView { image, desc: *desc }))
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        Self::remove_or_report(&mut self.image_views, view, "image view", &mut self.validation_errors);
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        Ok(self.samplers.insert(*desc))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        Self::remove_or_report(&mut self.samplers, sampler, "sampler", &mut self.validation_errors);
    }

    fn upload_image(&mut self, image: ImageHandle, data: &ImageData, final_layout: ImageLayout) -> Result<()> {
        let expected = data.expected_size();
        let Some(target) = self.images.get_mut(image) else {
            return Err(self.error(format!("upload to unknown image {:?}", image)));
        };
        if data.bytes.len() != expected {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes, expected {}",
                data.bytes.len(),
                expected
            )));
        }
        target.contents = Some(data.bytes.clone());
        target.layout = final_layout;
        Ok(())
    }

    fn read_image(&mut self, image: ImageHandle) -> Result<ImageData> {
        let Some(target) = self.images.get(image) else {
            return Err(self.error(format!("read of unknown image {:?}", image)));
        };
        if target.layout != ImageLayout::TransferSrc {
            let layout = target.layout;
            return Err(self.error(format!("read of image in {:?}", layout)));
        }
        let desc = target.desc.clone();
        let size = expected_image_size(desc.width, desc.height, desc.format, desc.mip_levels, desc.array_layers);
        let bytes = target.contents.clone().unwrap_or_else(|| Self::synthetic_contents(image, size));
        Ok(ImageData {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            is_cube: desc.cube_compatible,
            bytes,
        })
    }

    fn transition_image_layout(
        &mut self,
        image: ImageHandle,
        _range: SubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()> {
        let Some(target) = self.images.get_mut(image) else {
            return Err(self.error(format!("transition of unknown image {:?}", image)));
        };
        if old_layout != ImageLayout::Undefined && old_layout != target.layout {
            let message = format!("transition expects {:?} but image is in {:?}", old_layout, target.layout);
            self.validation_errors.push(message);
        }
        target.layout = new_layout;
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        self.take_allocation()?;
        Ok(self.buffers.insert((desc.clone(), vec![0; desc.size as usize])))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let Some((desc, contents)) = self.buffers.get_mut(buffer) else {
            return Err(self.error(format!("write to unknown buffer {:?}", buffer)));
        };
        let end = offset as usize + data.len();
        if end as u64 > desc.size {
            return Err(Error::InvalidResource(format!("write of {} bytes past buffer end", end)));
        }
        contents[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        Self::remove_or_report(&mut self.buffers, buffer, "buffer", &mut self.validation_errors);
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        desc.validate()?;
        Ok(self.render_passes.insert(desc.clone()))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        Self::remove_or_report(&mut self.render_passes, render_pass, "render pass", &mut self.validation_errors);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let Some(pass) = self.render_passes.get(desc.render_pass) else {
            return Err(self.error(format!("framebuffer for unknown render pass {:?}", desc.render_pass)));
        };
        if pass.attachments.len() != desc.attachments.len() {
            let message = format!(
                "{}: framebuffer has {} attachments, pass expects {}",
                pass.name,
                desc.attachments.len(),
                pass.attachments.len()
            );
            return Err(self.error(message));
        }
        for view in &desc.attachments {
            let extent = self.view_image(*view).map(|i| (i.desc.width, i.desc.height));
            match extent {
                None => return Err(self.error(format!("framebuffer references unknown view {:?}", view))),
                Some((w, h)) if w < desc.width || h < desc.height => {
                    return Err(self.error(format!("framebuffer {}x{} larger than attachment {}x{}", desc.width, desc.height, w, h)));
                }
                _ => {}
            }
        }
        Ok(self.framebuffers.insert(MockFramebuffer { desc: desc.clone() }))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        Self::remove_or_report(&mut self.framebuffers, framebuffer, "framebuffer", &mut self.validation_errors);
    }

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle> {
        Ok(self.set_layouts.insert(desc.clone()))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) {
        Self::remove_or_report(&mut self.set_layouts, layout, "descriptor set layout", &mut self.validation_errors);
    }

    fn allocate_descriptor_set(&mut self, layout: DescriptorSetLayoutHandle) -> Result<DescriptorSetHandle> {
        if !self.set_layouts.contains_key(layout) {
            return Err(self.error(format!("allocation with unknown layout {:?}", layout)));
        }
        Ok(self.descriptor_sets.insert(MockDescriptorSet { layout, writes: Vec::new() }))
    }

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let Some(layout) = self.descriptor_sets.get(set).map(|s| s.layout) else {
            return Err(self.error(format!("update of unknown descriptor set {:?}", set)));
        };
        let layout_desc = self.set_layouts[layout].clone();
        for write in writes {
            match layout_desc.binding(write.binding) {
                Some(b) if b.descriptor_type == write.resource.descriptor_type() => {}
                _ => {
                    return Err(self.error(format!(
                        "{}: write to binding {} does not match layout",
                        layout_desc.name, write.binding
                    )));
                }
            }
            if let Some(view) = write.resource.image_view() {
                if !self.image_views.contains_key(view) {
                    return Err(self.error(format!("descriptor write references unknown view {:?}", view)));
                }
            }
        }
        if let Some(target) = self.descriptor_sets.get_mut(set) {
            for write in writes {
                target.writes.retain(|w| w.binding != write.binding);
                target.writes.push(*write);
            }
        }
        Ok(())
    }

    fn free_descriptor_set(&mut self, set: DescriptorSetHandle) {
        Self::remove_or_report(&mut self.descriptor_sets, set, "descriptor set", &mut self.validation_errors);
    }

    fn create_shader_module(&mut self, desc: &ShaderModuleDesc) -> Result<ShaderModuleHandle> {
        if desc.code.is_empty() {
            return Err(Error::BackendError(format!("empty SPIR-V for {}", desc.name)));
        }
        Ok(self.shader_modules.insert(desc.clone()))
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        Self::remove_or_report(&mut self.shader_modules, module, "shader module", &mut self.validation_errors);
    }

    fn shader_interface(&self, module: ShaderModuleHandle) -> Result<ShaderInterface> {
        let desc = self
            .shader_modules
            .get(module)
            .ok_or_else(|| Error::InvalidResource(format!("unknown shader module {:?}", module)))?;
        Ok(self.shader_interfaces.get(&desc.name).cloned().unwrap_or_default())
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        Ok(self.pipeline_layouts.insert(desc.clone()))
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle) {
        Self::remove_or_report(&mut self.pipeline_layouts, layout, "pipeline layout", &mut self.validation_errors);
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let Some(pass) = self.render_passes.get(desc.render_pass) else {
            return Err(self.error(format!("{}: unknown render pass", desc.name)));
        };
        let Some(subpass) = pass.subpasses.get(desc.subpass as usize) else {
            return Err(self.error(format!("{}: subpass {} out of range", desc.name, desc.subpass)));
        };
        if subpass.color_attachments.len() != desc.color_blend.len() {
            let message = format!(
                "{}: {} blend states for {} color attachments",
                desc.name,
                desc.color_blend.len(),
                subpass.color_attachments.len()
            );
            return Err(self.error(message));
        }
        Ok(self.pipelines.insert(MockPipeline::Graphics(desc.clone())))
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> Result<PipelineHandle> {
        Ok(self.pipelines.insert(MockPipeline::Compute(desc.clone())))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        Self::remove_or_report(&mut self.pipelines, pipeline, "pipeline", &mut self.validation_errors);
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        Ok(self.semaphores.insert(()))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        Self::remove_or_report(&mut self.semaphores, semaphore, "semaphore", &mut self.validation_errors);
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        Ok(self.fences.insert(MockFence { signaled }))
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        Self::remove_or_report(&mut self.fences, fence, "fence", &mut self.validation_errors);
    }

    fn wait_for_fence(&mut self, fence: FenceHandle, _timeout_ns: u64) -> Result<()> {
        match self.fences.get(fence).map(|f| f.signaled) {
            Some(true) => Ok(()),
            Some(false) => Err(self.error(format!("wait on fence {:?} that nothing will signal", fence))),
            None => Err(self.error(format!("wait on unknown fence {:?}", fence))),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()> {
        match self.fences.get_mut(fence) {
            Some(f) => {
                f.signaled = false;
                Ok(())
            }
            None => Err(self.error(format!("reset of unknown fence {:?}", fence))),
        }
    }

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle> {
        Ok(self.command_buffers.insert(MockCommandBuffer {
            queue,
            usage: None,
            recording: false,
            submit_count: 0,
            commands: Vec::new(),
        }))
    }

    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle) {
        Self::remove_or_report(&mut self.command_buffers, command_buffer, "command buffer", &mut self.validation_errors);
    }

    fn begin_command_buffer(&mut self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()> {
        let Some(cb) = self.command_buffers.get_mut(command_buffer) else {
            return Err(self.error(format!("begin of unknown command buffer {:?}", command_buffer)));
        };
        if cb.recording {
            return Err(self.error(format!("begin of command buffer {:?} already recording", command_buffer)));
        }
        cb.recording = true;
        cb.usage = Some(usage);
        cb.submit_count = 0;
        cb.commands.clear();
        Ok(())
    }

    fn record(&mut self, command_buffer: CommandBufferHandle, command: &Command) -> Result<()> {
        match self.command_buffers.get(command_buffer).map(|cb| cb.recording) {
            Some(true) => {
                self.command_buffers[command_buffer].commands.push(command.clone());
                Ok(())
            }
            Some(false) => Err(self.error(format!("record into command buffer {:?} not recording", command_buffer))),
            None => Err(self.error(format!("record into unknown command buffer {:?}", command_buffer))),
        }
    }

    fn end_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        if self.command_buffers.get(command_buffer).map(|cb| cb.recording) != Some(true) {
            return Err(self.error(format!("end of command buffer {:?} not recording", command_buffer)));
        }
        self.command_buffers[command_buffer].recording = false;
        Ok(())
    }

    fn submit(&mut self, submit: &SubmitInfo) -> Result<()> {
        for wait in &submit.wait {
            if !self.semaphores.contains_key(wait.semaphore) {
                return Err(self.error(format!("wait on unknown semaphore {:?}", wait.semaphore)));
            }
        }
        for cb_handle in &submit.command_buffers {
            let Some(cb) = self.command_buffers.get_mut(*cb_handle) else {
                return Err(self.error(format!("submit of unknown command buffer {:?}", cb_handle)));
            };
            if cb.recording || cb.usage.is_none() {
                return Err(self.error(format!("submit of unfinished command buffer {:?}", cb_handle)));
            }
            if cb.queue != submit.queue {
                return Err(self.error(format!("command buffer {:?} submitted to the wrong queue", cb_handle)));
            }
            if cb.usage == Some(CommandBufferUsage::OneTimeSubmit) && cb.submit_count > 0 {
                return Err(self.error(format!("one-time command buffer {:?} resubmitted", cb_handle)));
            }
            cb.submit_count += 1;
        }
        for cb_handle in &submit.command_buffers {
            self.execute(*cb_handle)?;
        }
        if let Some(fence) = submit.fence {
            match self.fences.get(fence).map(|f| f.signaled) {
                Some(false) => self.fences[fence].signaled = true,
                Some(true) => return Err(self.error(format!("submit with already signaled fence {:?}", fence))),
                None => return Err(self.error(format!("submit with unknown fence {:?}", fence))),
            }
        }
        self.submissions.push(submit.clone());
        self.events.push(MockEvent::Submit(self.submissions.len() - 1));
        Ok(())
    }

    fn swapchain_info(&self) -> SwapchainInfo {
        self.swapchain.clone()
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<SwapchainInfo> {
        let (width, height) = self.surface_extent.unwrap_or((width, height));
        if width == 0 || height == 0 {
            return Err(Error::SurfaceOutOfDate);
        }
        self.build_swapchain(width, height);
        self.events.push(MockEvent::RecreateSwapchain(width, height));
        Ok(self.swapchain.clone())
    }

    fn acquire_next_image(&mut self, signal: SemaphoreHandle, _timeout_ns: u64) -> Result<AcquireResult> {
        if !self.semaphores.contains_key(signal) {
            return Err(self.error(format!("acquire signals unknown semaphore {:?}", signal)));
        }
        let result = match self.acquire_script.pop_front() {
            Some(result) => result,
            None => {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.swapchain_image_count;
                AcquireResult::Ready { image_index, suboptimal: false }
            }
        };
        self.events.push(MockEvent::Acquire(result));
        Ok(result)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus> {
        if !self.semaphores.contains_key(wait) {
            return Err(self.error(format!("present waits on unknown semaphore {:?}", wait)));
        }
        if let Some(image) = self.swapchain.images.get(image_index as usize).copied() {
            let layout = self.images[image].layout;
            if layout != ImageLayout::PresentSrc {
                self.validation_errors.push(format!("present of image in {:?}", layout));
            }
        }
        let status = self.present_script.pop_front().unwrap_or(PresentStatus::Presented);
        self.events.push(MockEvent::Present(image_index, status));
        Ok(status)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.events.push(MockEvent::WaitIdle);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
