/// Render passes, framebuffers, descriptor sets, shader modules and pipelines

use ash::vk;
use laugh_engine::laugh::{Error, Result};
use laugh_engine::laugh::device::*;
use laugh_engine::{engine_bail, engine_debug, engine_error};

use crate::vulkan_device::{VkDescriptorSet, VkDescriptorSetLayout, VkShaderModule, VulkanDevice};
use crate::vulkan_format::*;
use crate::vulkan_reflection::reflect_shader;

impl VulkanDevice {
    // ===== RENDER PASSES =====

    pub(crate) fn create_render_pass_impl(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        desc.validate()?;

        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|a| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(a.format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(load_op_to_vk(a.load_op))
                    .store_op(store_op_to_vk(a.store_op))
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(image_layout_to_vk(a.initial_layout))
                    .final_layout(image_layout_to_vk(a.final_layout))
            })
            .collect();

        let to_vk_ref = |r: &AttachmentRef| vk::AttachmentReference {
            attachment: r.attachment,
            layout: image_layout_to_vk(r.layout),
        };
        let references: Vec<SubpassReferences> = desc
            .subpasses
            .iter()
            .map(|s| SubpassReferences {
                color: s.color_attachments.iter().map(to_vk_ref).collect(),
                depth: s.depth_attachment.as_ref().map(to_vk_ref),
                input: s.input_attachments.iter().map(to_vk_ref).collect(),
            })
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = references
            .iter()
            .map(|r| {
                let subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(&r.color)
                    .input_attachments(&r.input);
                match &r.depth {
                    Some(depth) => subpass.depth_stencil_attachment(depth),
                    None => subpass,
                }
            })
            .collect();

        let dependencies: Vec<vk::SubpassDependency> = desc
            .dependencies
            .iter()
            .map(|d| {
                vk::SubpassDependency::default()
                    .src_subpass(subpass_index_to_vk(d.src_subpass))
                    .dst_subpass(subpass_index_to_vk(d.dst_subpass))
                    .src_stage_mask(pipeline_stage_to_vk(d.src_stage))
                    .dst_stage_mask(pipeline_stage_to_vk(d.dst_stage))
                    .src_access_mask(access_to_vk(d.src_access))
                    .dst_access_mask(access_to_vk(d.dst_access))
                    .dependency_flags(if d.by_region {
                        vk::DependencyFlags::BY_REGION
                    } else {
                        vk::DependencyFlags::empty()
                    })
            })
            .collect();

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { self.device.create_render_pass(&render_pass_info, None) }.map_err(|e| {
            engine_error!("laugh::vulkan", "Failed to create render pass '{}': {:?}", desc.name, e);
            vk_result_to_error("create render pass", e)
        })?;

        engine_debug!(
            "laugh::vulkan",
            "Render pass '{}': {} attachments, {} subpasses",
            desc.name, attachments.len(), subpasses.len()
        );
        Ok(self.render_passes.insert(render_pass))
    }

    pub(crate) fn render_pass(&self, render_pass: RenderPassHandle) -> Result<vk::RenderPass> {
        self.render_passes
            .get(render_pass)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown render pass".to_string()))
    }

    pub(crate) fn create_framebuffer_impl(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let render_pass = self.render_pass(desc.render_pass)?;
        let views = desc
            .attachments
            .iter()
            .map(|&view| self.image_view(view))
            .collect::<Result<Vec<_>>>()?;

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers.max(1));

        let framebuffer = unsafe { self.device.create_framebuffer(&framebuffer_info, None) }
            .map_err(|e| vk_result_to_error("create framebuffer", e))?;
        Ok(self.framebuffers.insert(framebuffer))
    }

    pub(crate) fn framebuffer(&self, framebuffer: FramebufferHandle) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(framebuffer)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown framebuffer".to_string()))
    }

    // ===== DESCRIPTORS =====

    pub(crate) fn create_descriptor_set_layout_impl(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> Result<DescriptorSetLayoutHandle> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(1)
                    .stage_flags(shader_stage_to_vk(b.stages))
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&layout_info, None) }.map_err(|e| {
            engine_error!("laugh::vulkan", "Failed to create descriptor set layout '{}': {:?}", desc.name, e);
            vk_result_to_error("create descriptor set layout", e)
        })?;
        Ok(self.descriptor_set_layouts.insert(VkDescriptorSetLayout { layout, desc: desc.clone() }))
    }

    /// Allocate from the newest pool, adding a pool when it is exhausted
    pub(crate) fn allocate_descriptor_set_impl(&mut self, layout: DescriptorSetLayoutHandle) -> Result<DescriptorSetHandle> {
        let entry = self
            .descriptor_set_layouts
            .get(layout)
            .ok_or_else(|| Error::InvalidResource("Unknown descriptor set layout".to_string()))?;
        let vk_layout = entry.layout;
        let layout_desc = entry.desc.clone();

        let pool = match self.descriptor_pools.last() {
            Some(&pool) => pool,
            None => self.grow_descriptor_pools()?,
        };
        let (set, pool) = match self.try_allocate_set(pool, vk_layout) {
            Ok(set) => (set, pool),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                let pool = self.grow_descriptor_pools()?;
                let set = self
                    .try_allocate_set(pool, vk_layout)
                    .map_err(|e| vk_result_to_error("allocate descriptor set", e))?;
                (set, pool)
            }
            Err(e) => return Err(vk_result_to_error("allocate descriptor set", e)),
        };

        Ok(self.descriptor_sets.insert(VkDescriptorSet { set, pool, layout: layout_desc }))
    }

    fn try_allocate_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }?;
        sets.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn grow_descriptor_pools(&mut self) -> Result<vk::DescriptorPool> {
        let pool = Self::create_descriptor_pool(&self.device)?;
        self.descriptor_pools.push(pool);
        engine_debug!("laugh::vulkan", "Descriptor pool grown to {} pools", self.descriptor_pools.len());
        Ok(pool)
    }

    pub(crate) fn descriptor_set(&self, set: DescriptorSetHandle) -> Result<vk::DescriptorSet> {
        self.descriptor_sets
            .get(set)
            .map(|entry| entry.set)
            .ok_or_else(|| Error::InvalidResource("Unknown descriptor set".to_string()))
    }

    pub(crate) fn update_descriptor_set_impl(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let entry = self
            .descriptor_sets
            .get(set)
            .ok_or_else(|| Error::InvalidResource("Unknown descriptor set".to_string()))?;
        let vk_set = entry.set;

        for write in writes {
            let expected = entry.layout.binding(write.binding).map(|b| b.descriptor_type);
            if expected != Some(write.resource.descriptor_type()) {
                return Err(Error::InvalidResource(format!(
                    "Descriptor set '{}' binding {} expects {:?}, got {:?}",
                    entry.layout.name,
                    write.binding,
                    expected,
                    write.resource.descriptor_type()
                )));
            }
        }

        let mut infos = Vec::with_capacity(writes.len());
        for write in writes {
            let info = match write.resource {
                DescriptorResource::UniformBuffer { buffer, offset, range } => {
                    WriteInfo::Buffer([vk::DescriptorBufferInfo {
                        buffer: self.buffer(buffer)?.buffer,
                        offset,
                        range,
                    }])
                }
                DescriptorResource::CombinedImageSampler { view, sampler, layout } => {
                    WriteInfo::Image([vk::DescriptorImageInfo {
                        sampler: self.sampler(sampler)?,
                        image_view: self.image_view(view)?,
                        image_layout: image_layout_to_vk(layout),
                    }])
                }
                DescriptorResource::InputAttachment { view, layout }
                | DescriptorResource::StorageImage { view, layout } => WriteInfo::Image([vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: self.image_view(view)?,
                    image_layout: image_layout_to_vk(layout),
                }]),
            };
            infos.push(info);
        }

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&infos)
            .map(|(write, info)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(vk_set)
                    .dst_binding(write.binding)
                    .descriptor_type(descriptor_type_to_vk(write.resource.descriptor_type()));
                match info {
                    WriteInfo::Buffer(buffer_info) => vk_write.buffer_info(buffer_info),
                    WriteInfo::Image(image_info) => vk_write.image_info(image_info),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }

    // ===== SHADERS =====

    pub(crate) fn create_shader_module_impl(&mut self, desc: &ShaderModuleDesc) -> Result<ShaderModuleHandle> {
        let interface = reflect_shader(&desc.name, &desc.code)?;

        let module_info = vk::ShaderModuleCreateInfo::default().code(&desc.code);
        let module = unsafe { self.device.create_shader_module(&module_info, None) }.map_err(|e| {
            engine_error!("laugh::vulkan", "Failed to create shader module '{}': {:?}", desc.name, e);
            vk_result_to_error("create shader module", e)
        })?;

        engine_debug!(
            "laugh::vulkan",
            "Shader '{}' ({}): {} bindings, {} push constant bytes",
            desc.name, desc.stage.name(), interface.bindings.len(), interface.push_constant_size
        );
        Ok(self.shader_modules.insert(VkShaderModule {
            module,
            name: desc.name.clone(),
            stage: desc.stage,
            interface,
        }))
    }

    /// The module, checked against the stage the pipeline uses it for
    fn shader_module_for(&self, pipeline: &str, module: ShaderModuleHandle, stage: ShaderStage) -> Result<vk::ShaderModule> {
        let entry = self
            .shader_modules
            .get(module)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown shader module in pipeline '{}'", pipeline)))?;
        if entry.stage != stage {
            return Err(Error::ShaderStageMismatch {
                pipeline: pipeline.to_string(),
                stage: stage.name().to_string(),
                detail: format!("module '{}' was compiled for the {} stage", entry.name, entry.stage.name()),
            });
        }
        Ok(entry.module)
    }

    // ===== PIPELINES =====

    pub(crate) fn create_pipeline_layout_impl(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let set_layouts = desc
            .set_layouts
            .iter()
            .map(|&layout| {
                self.descriptor_set_layouts
                    .get(layout)
                    .map(|entry| entry.layout)
                    .ok_or_else(|| Error::InvalidResource("Unknown descriptor set layout".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_push = self.limits().max_push_constants_size;
        let mut push_constant_ranges = Vec::with_capacity(desc.push_constant_ranges.len());
        for range in &desc.push_constant_ranges {
            if range.offset + range.size > max_push {
                engine_bail!(
                    "laugh::vulkan",
                    "Push constant range {}..{} exceeds device limit of {} bytes",
                    range.offset, range.offset + range.size, max_push
                );
            }
            push_constant_ranges.push(vk::PushConstantRange {
                stage_flags: shader_stage_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            });
        }

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe { self.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| vk_result_to_error("create pipeline layout", e))?;
        Ok(self.pipeline_layouts.insert(layout))
    }

    pub(crate) fn pipeline_layout(&self, layout: PipelineLayoutHandle) -> Result<vk::PipelineLayout> {
        self.pipeline_layouts
            .get(layout)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown pipeline layout".to_string()))
    }

    pub(crate) fn create_graphics_pipeline_impl(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let layout = self.pipeline_layout(desc.layout)?;
        let render_pass = self.render_pass(desc.render_pass)?;

        let modules = desc
            .stages
            .iter()
            .map(|s| self.shader_module_for(&desc.name, s.module, s.stage))
            .collect::<Result<Vec<_>>>()?;

        let specializations: Vec<SpecializationData> = desc
            .stages
            .iter()
            .map(|s| SpecializationData::new(&s.specialization))
            .collect();
        let specialization_infos: Vec<vk::SpecializationInfo> =
            specializations.iter().map(SpecializationData::info).collect();

        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = desc
            .stages
            .iter()
            .zip(&modules)
            .zip(&specialization_infos)
            .map(|((stage, &module), specialization)| {
                let info = vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(stage.stage))
                    .module(module)
                    .name(c"main");
                if stage.specialization.is_empty() {
                    info
                } else {
                    info.specialization_info(specialization)
                }
            })
            .collect();

        // Vertex input (empty for full-screen triangles)
        let (binding_descriptions, attribute_descriptions) = match &desc.vertex_layout {
            Some(vertex_layout) => (
                vec![vk::VertexInputBindingDescription {
                    binding: 0,
                    stride: vertex_layout.stride,
                    input_rate: vk::VertexInputRate::VERTEX,
                }],
                vertex_layout
                    .attributes
                    .iter()
                    .map(|a| vk::VertexInputAttributeDescription {
                        location: a.location,
                        binding: 0,
                        format: format_to_vk(a.format),
                        offset: a.offset,
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport: baked, or set per draw
        let (width, height) = desc.extent;
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        }];
        let viewport_state = if desc.dynamic_viewport {
            vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1)
        } else {
            vk::PipelineViewportStateCreateInfo::default().viewports(&viewports).scissors(&scissors)
        };
        let dynamic_states = if desc.dynamic_viewport {
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        } else {
            Vec::new()
        };
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(front_face_to_vk(desc.front_face));

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth.test_enable)
            .depth_write_enable(desc.depth.write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_blend
            .iter()
            .map(|b| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(b.blend_enable)
                    .src_color_blend_factor(blend_factor_to_vk(b.src_factor))
                    .dst_color_blend_factor(blend_factor_to_vk(b.dst_factor))
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(blend_factor_to_vk(b.src_factor))
                    .dst_alpha_blend_factor(blend_factor_to_vk(b.dst_factor))
                    .alpha_blend_op(vk::BlendOp::ADD)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stage_infos)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| {
            engine_error!("laugh::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e);
            vk_result_to_error("create graphics pipeline", e)
        })?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError(format!("No pipeline returned for '{}'", desc.name)))?;
        Ok(self.pipelines.insert(pipeline))
    }

    pub(crate) fn create_compute_pipeline_impl(&mut self, desc: &ComputePipelineDesc) -> Result<PipelineHandle> {
        let layout = self.pipeline_layout(desc.layout)?;
        let module = self.shader_module_for(&desc.name, desc.module, ShaderStage::COMPUTE)?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(c"main");
        let pipeline_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| {
            engine_error!("laugh::vulkan", "Failed to create compute pipeline '{}': {:?}", desc.name, e);
            vk_result_to_error("create compute pipeline", e)
        })?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError(format!("No pipeline returned for '{}'", desc.name)))?;
        Ok(self.pipelines.insert(pipeline))
    }

    pub(crate) fn pipeline(&self, pipeline: PipelineHandle) -> Result<vk::Pipeline> {
        self.pipelines
            .get(pipeline)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown pipeline".to_string()))
    }
}

/// Attachment references of one subpass, kept alive while the pass is created
struct SubpassReferences {
    color: Vec<vk::AttachmentReference>,
    depth: Option<vk::AttachmentReference>,
    input: Vec<vk::AttachmentReference>,
}

/// Single-element info arrays referenced by a descriptor write
enum WriteInfo {
    Buffer([vk::DescriptorBufferInfo; 1]),
    Image([vk::DescriptorImageInfo; 1]),
}

/// Specialization map and packed constant values of one shader stage
pub(crate) struct SpecializationData {
    pub(crate) entries: Vec<vk::SpecializationMapEntry>,
    pub(crate) data: Vec<u8>,
}

impl SpecializationData {
    /// Constants are packed as consecutive 4-byte values
    pub(crate) fn new(constants: &[SpecializationConstant]) -> Self {
        let entries = constants
            .iter()
            .enumerate()
            .map(|(i, c)| vk::SpecializationMapEntry {
                constant_id: c.constant_id,
                offset: (i * 4) as u32,
                size: 4,
            })
            .collect();
        let data = constants.iter().flat_map(|c| c.value.to_ne_bytes()).collect();
        Self { entries, data }
    }

    fn info(&self) -> vk::SpecializationInfo<'_> {
        vk::SpecializationInfo::default().map_entries(&self.entries).data(&self.data)
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
