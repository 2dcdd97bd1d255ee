/// Command buffer allocation, recording and queue submission
///
/// Each `Command` is translated to native calls as soon as it is recorded.

use ash::vk;
use laugh_engine::laugh::{Error, Result};
use laugh_engine::laugh::device::*;

use crate::vulkan_device::{VkCommandBuffer, VulkanDevice};
use crate::vulkan_format::*;

impl VulkanDevice {
    pub(crate) fn allocate_command_buffer_impl(&mut self, queue: QueueKind) -> Result<CommandBufferHandle> {
        let pool = self.queue(queue).command_pool;
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| vk_result_to_error("allocate command buffer", e))?;
        let buffer = buffers
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("No command buffer returned".to_string()))?;
        Ok(self.command_buffers.insert(VkCommandBuffer { buffer, pool }))
    }

    fn command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<vk::CommandBuffer> {
        self.command_buffers
            .get(command_buffer)
            .map(|entry| entry.buffer)
            .ok_or_else(|| Error::InvalidResource("Unknown command buffer".to_string()))
    }

    /// Begin recording (implicitly resets the buffer)
    pub(crate) fn begin_command_buffer_impl(&mut self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()> {
        let cb = self.command_buffer(command_buffer)?;
        let flags = match usage {
            CommandBufferUsage::OneTimeSubmit => vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            CommandBufferUsage::SimultaneousUse => vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.device.begin_command_buffer(cb, &begin_info) }
            .map_err(|e| vk_result_to_error("begin command buffer", e))
    }

    pub(crate) fn end_command_buffer_impl(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        let cb = self.command_buffer(command_buffer)?;
        unsafe { self.device.end_command_buffer(cb) }.map_err(|e| vk_result_to_error("end command buffer", e))
    }

    pub(crate) fn record_impl(&mut self, command_buffer: CommandBufferHandle, command: &Command) -> Result<()> {
        let cb = self.command_buffer(command_buffer)?;
        let device = &self.device;

        unsafe {
            match command {
                Command::BeginRenderPass { render_pass, framebuffer, render_area, clear_values } => {
                    let clear_values: Vec<vk::ClearValue> =
                        clear_values.iter().map(|&value| clear_value_to_vk(value)).collect();
                    let begin_info = vk::RenderPassBeginInfo::default()
                        .render_pass(self.render_pass(*render_pass)?)
                        .framebuffer(self.framebuffer(*framebuffer)?)
                        .render_area(rect_to_vk(*render_area))
                        .clear_values(&clear_values);
                    device.cmd_begin_render_pass(cb, &begin_info, vk::SubpassContents::INLINE);
                }
                Command::NextSubpass => device.cmd_next_subpass(cb, vk::SubpassContents::INLINE),
                Command::EndRenderPass => device.cmd_end_render_pass(cb),
                Command::BindPipeline { bind_point, pipeline } => {
                    device.cmd_bind_pipeline(cb, bind_point_to_vk(*bind_point), self.pipeline(*pipeline)?);
                }
                Command::BindDescriptorSets { bind_point, layout, first_set, sets } => {
                    let sets = sets
                        .iter()
                        .map(|&set| self.descriptor_set(set))
                        .collect::<Result<Vec<_>>>()?;
                    device.cmd_bind_descriptor_sets(
                        cb,
                        bind_point_to_vk(*bind_point),
                        self.pipeline_layout(*layout)?,
                        *first_set,
                        &sets,
                        &[],
                    );
                }
                Command::PushConstants { layout, stages, offset, data } => {
                    device.cmd_push_constants(
                        cb,
                        self.pipeline_layout(*layout)?,
                        shader_stage_to_vk(*stages),
                        *offset,
                        data,
                    );
                }
                Command::BindVertexBuffer { buffer, offset } => {
                    device.cmd_bind_vertex_buffers(cb, 0, &[self.buffer(*buffer)?.buffer], &[*offset]);
                }
                Command::BindIndexBuffer { buffer, offset, index_type } => {
                    device.cmd_bind_index_buffer(
                        cb,
                        self.buffer(*buffer)?.buffer,
                        *offset,
                        index_type_to_vk(*index_type),
                    );
                }
                Command::SetViewport(viewport) => {
                    let viewport = vk::Viewport {
                        x: viewport.x,
                        y: viewport.y,
                        width: viewport.width,
                        height: viewport.height,
                        min_depth: viewport.min_depth,
                        max_depth: viewport.max_depth,
                    };
                    device.cmd_set_viewport(cb, 0, &[viewport]);
                }
                Command::SetScissor(rect) => device.cmd_set_scissor(cb, 0, &[rect_to_vk(*rect)]),
                Command::Draw { vertex_count, instance_count } => {
                    device.cmd_draw(cb, *vertex_count, *instance_count, 0, 0);
                }
                Command::DrawIndexed { index_count, instance_count } => {
                    device.cmd_draw_indexed(cb, *index_count, *instance_count, 0, 0, 0);
                }
                Command::Dispatch { x, y, z } => device.cmd_dispatch(cb, *x, *y, *z),
                Command::PipelineBarrier { src_stage, dst_stage, images } => {
                    let barriers = images
                        .iter()
                        .map(|barrier| self.image_barrier_to_vk(barrier))
                        .collect::<Result<Vec<_>>>()?;
                    device.cmd_pipeline_barrier(
                        cb,
                        barrier_stage(*src_stage, vk::PipelineStageFlags::TOP_OF_PIPE),
                        barrier_stage(*dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &barriers,
                    );
                }
            }
        }
        Ok(())
    }

    fn image_barrier_to_vk(&self, barrier: &ImageBarrier) -> Result<vk::ImageMemoryBarrier<'static>> {
        let image = self.image(barrier.image)?;
        Ok(vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(barrier.old_layout))
            .new_layout(image_layout_to_vk(barrier.new_layout))
            .src_access_mask(access_to_vk(barrier.src_access))
            .dst_access_mask(access_to_vk(barrier.dst_access))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.image)
            .subresource_range(subresource_range_to_vk(barrier.range, barrier_aspect(image.desc.format))))
    }

    pub(crate) fn submit_impl(&mut self, submit: &SubmitInfo) -> Result<()> {
        let command_buffers = submit
            .command_buffers
            .iter()
            .map(|&cb| self.command_buffer(cb))
            .collect::<Result<Vec<_>>>()?;
        let mut wait_semaphores = Vec::with_capacity(submit.wait.len());
        let mut wait_stages = Vec::with_capacity(submit.wait.len());
        for wait in &submit.wait {
            wait_semaphores.push(self.semaphore(wait.semaphore)?);
            wait_stages.push(barrier_stage(wait.stage, vk::PipelineStageFlags::TOP_OF_PIPE));
        }
        let signal_semaphores = submit
            .signal
            .iter()
            .map(|&semaphore| self.semaphore(semaphore))
            .collect::<Result<Vec<_>>>()?;
        let fence = match submit.fence {
            Some(fence) => self.fence(fence)?,
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let queue = self.queue(submit.queue).queue;
        unsafe { self.device.queue_submit(queue, &[submit_info], fence) }
            .map_err(|e| vk_result_to_error("submit", e))
    }
}

fn rect_to_vk(rect: Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D { width: rect.width, height: rect.height },
    }
}

/// Stage mask of a barrier or wait, with a fallback for an empty mask
fn barrier_stage(stage: PipelineStage, empty: vk::PipelineStageFlags) -> vk::PipelineStageFlags {
    if stage.is_empty() { empty } else { pipeline_stage_to_vk(stage) }
}
