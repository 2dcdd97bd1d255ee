/// VulkanDevice - the Vulkan implementation of `GraphicsDevice`
///
/// Owns the instance, surface, logical device, allocator and every object
/// created through the device contract. Objects live in generational arenas
/// keyed by the contract's handles; whatever is still alive at drop time is
/// destroyed before the device itself.
///
/// Object creation is split across sibling modules by concern:
/// `vulkan_resources` (images, buffers, samplers, uploads),
/// `vulkan_pipeline` (render passes, descriptors, shaders, pipelines) and
/// `vulkan_command` (command recording and submission).

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator, AllocatorCreateDesc};
use laugh_engine::laugh::{Error, RendererConfig, Result};
use laugh_engine::laugh::device::*;
use laugh_engine::{engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::SlotMap;
use std::mem::ManuallyDrop;

use crate::vulkan_format::{format_feature_to_vk, format_to_vk, vk_result_to_error};
use crate::vulkan_swapchain::{SurfaceContext, Swapchain};

/// Initial and grown descriptor pool capacity (sets)
pub(crate) const DESCRIPTOR_POOL_SETS: u32 = 1024;

// ===== ARENA ENTRIES =====

pub(crate) struct VkImage {
    pub image: vk::Image,
    /// None for swap chain images (owned by the swap chain)
    pub allocation: Option<Allocation>,
    pub desc: ImageDesc,
}

pub(crate) struct VkImageView {
    pub view: vk::ImageView,
    pub owned: bool,
}

pub(crate) struct VkBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub desc: BufferDesc,
}

pub(crate) struct VkShaderModule {
    pub module: vk::ShaderModule,
    pub name: String,
    pub stage: ShaderStage,
    pub interface: ShaderInterface,
}

pub(crate) struct VkDescriptorSetLayout {
    pub layout: vk::DescriptorSetLayout,
    pub desc: DescriptorSetLayoutDesc,
}

pub(crate) struct VkDescriptorSet {
    pub set: vk::DescriptorSet,
    /// Pool the set was allocated from (needed to free it)
    pub pool: vk::DescriptorPool,
    /// Bindings of the layout, for validating writes
    pub layout: DescriptorSetLayoutDesc,
}

pub(crate) struct VkCommandBuffer {
    pub buffer: vk::CommandBuffer,
    pub pool: vk::CommandPool,
}

/// One hardware queue and the command pool feeding it
pub(crate) struct Queue {
    pub family: u32,
    pub queue: vk::Queue,
    pub command_pool: vk::CommandPool,
}

// ===== DEVICE =====

pub struct VulkanDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) graphics: Queue,
    /// Dedicated compute family, when the hardware has one
    pub(crate) compute: Option<Queue>,
    present_queue: vk::Queue,
    pub(crate) allocator: ManuallyDrop<Allocator>,
    limits: DeviceLimits,

    swapchain: Option<Swapchain>,
    swapchain_info: SwapchainInfo,

    pub(crate) descriptor_pools: Vec<vk::DescriptorPool>,
    /// Signaled by one-shot upload/readback submissions
    pub(crate) upload_fence: vk::Fence,

    pub(crate) images: SlotMap<ImageHandle, VkImage>,
    pub(crate) image_views: SlotMap<ImageViewHandle, VkImageView>,
    pub(crate) samplers: SlotMap<SamplerHandle, vk::Sampler>,
    pub(crate) buffers: SlotMap<BufferHandle, VkBuffer>,
    pub(crate) render_passes: SlotMap<RenderPassHandle, vk::RenderPass>,
    pub(crate) framebuffers: SlotMap<FramebufferHandle, vk::Framebuffer>,
    pub(crate) descriptor_set_layouts: SlotMap<DescriptorSetLayoutHandle, VkDescriptorSetLayout>,
    pub(crate) descriptor_sets: SlotMap<DescriptorSetHandle, VkDescriptorSet>,
    pub(crate) shader_modules: SlotMap<ShaderModuleHandle, VkShaderModule>,
    pub(crate) pipeline_layouts: SlotMap<PipelineLayoutHandle, vk::PipelineLayout>,
    pub(crate) pipelines: SlotMap<PipelineHandle, vk::Pipeline>,
    pub(crate) semaphores: SlotMap<SemaphoreHandle, vk::Semaphore>,
    pub(crate) fences: SlotMap<FenceHandle, vk::Fence>,
    pub(crate) command_buffers: SlotMap<CommandBufferHandle, VkCommandBuffer>,
}

impl VulkanDevice {
    /// Create the device for a window
    ///
    /// Validation layers and the debug messenger are enabled when
    /// `config.enable_validation` is set or the `vulkan-validation` feature is on.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        let enable_validation = cfg!(feature = "vulkan-validation") || config.enable_validation;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = std::ffi::CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| c"Laugh Application".to_owned());
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Laugh")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let debug_utils = if enable_validation {
                let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let debug_config = crate::debug::Config::from_renderer_config(config);
                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(debug_config.severity_flags())
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));
                crate::debug::init_debug_config(debug_config);

                let messenger = loader.create_debug_utils_messenger(&debug_info, None).map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?;
                Some((loader, messenger))
            } else {
                None
            };

            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_device = instance
                .enumerate_physical_devices()
                .map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to enumerate physical devices: {:?}", e);
                    Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
                })?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    engine_error!("laugh::vulkan", "No Vulkan-capable GPU found");
                    Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
                })?;

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let graphics_family = queue_families
                .iter()
                .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32)
                .ok_or_else(|| {
                    engine_error!("laugh::vulkan", "No graphics queue family found");
                    Error::InitializationFailed("No graphics queue family found".to_string())
                })?;
            let present_family = (0..queue_families.len() as u32)
                .find(|&i| {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, i, surface)
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    engine_error!("laugh::vulkan", "No present queue family found");
                    Error::InitializationFailed("No present queue family found".to_string())
                })?;
            let compute_family = queue_families
                .iter()
                .position(|qf| {
                    qf.queue_flags.contains(vk::QueueFlags::COMPUTE)
                        && !qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                })
                .map(|i| i as u32);

            let mut families = vec![graphics_family];
            for family in [Some(present_family), compute_family].into_iter().flatten() {
                if !families.contains(&family) {
                    families.push(family);
                }
            }
            let queue_priorities = [1.0];
            let queue_create_infos: Vec<_> = families
                .iter()
                .map(|&family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let supported_features = instance.get_physical_device_features(physical_device);
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supported_features.sampler_anisotropy == vk::TRUE)
                .geometry_shader(supported_features.geometry_shader == vk::TRUE);
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics = Self::create_queue(&device, graphics_family)?;
            let compute = match compute_family {
                Some(family) => Some(Self::create_queue(&device, family)?),
                None => None,
            };
            let present_queue = device.get_device_queue(present_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let limits = DeviceLimits {
                min_uniform_buffer_offset_alignment: properties.limits.min_uniform_buffer_offset_alignment,
                max_push_constants_size: properties.limits.max_push_constants_size,
                has_async_compute: compute.is_some(),
            };
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            engine_info!(
                "laugh::vulkan",
                "Using GPU '{}' (graphics family {}, compute family {:?})",
                device_name,
                graphics.family,
                compute.as_ref().map(|queue| queue.family)
            );

            let upload_fence = device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| vk_result_to_error("create upload fence", e))?;
            let descriptor_pool = Self::create_descriptor_pool(&device)?;

            let mut vulkan_device = Self {
                _entry: entry,
                instance,
                debug_utils,
                surface_loader,
                surface,
                physical_device,
                device,
                graphics,
                compute,
                present_queue,
                allocator: ManuallyDrop::new(allocator),
                limits,
                swapchain: None,
                swapchain_info: SwapchainInfo {
                    format: Format::B8G8R8A8_SRGB,
                    width: 0,
                    height: 0,
                    images: Vec::new(),
                    image_views: Vec::new(),
                },
                descriptor_pools: vec![descriptor_pool],
                upload_fence,
                images: SlotMap::with_key(),
                image_views: SlotMap::with_key(),
                samplers: SlotMap::with_key(),
                buffers: SlotMap::with_key(),
                render_passes: SlotMap::with_key(),
                framebuffers: SlotMap::with_key(),
                descriptor_set_layouts: SlotMap::with_key(),
                descriptor_sets: SlotMap::with_key(),
                shader_modules: SlotMap::with_key(),
                pipeline_layouts: SlotMap::with_key(),
                pipelines: SlotMap::with_key(),
                semaphores: SlotMap::with_key(),
                fences: SlotMap::with_key(),
                command_buffers: SlotMap::with_key(),
            };

            vulkan_device.rebuild_swapchain(config.width, config.height)?;
            Ok(vulkan_device)
        }
    }

    fn create_queue(device: &ash::Device, family: u32) -> Result<Queue> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        unsafe {
            let command_pool = device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })?;
            Ok(Queue { family, queue: device.get_device_queue(family, 0), command_pool })
        }
    }

    /// Descriptor pool sized for `DESCRIPTOR_POOL_SETS` sets of every supported type
    ///
    /// Called at init and whenever every existing pool is exhausted.
    pub(crate) fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: DESCRIPTOR_POOL_SETS * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: DESCRIPTOR_POOL_SETS,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::INPUT_ATTACHMENT,
                descriptor_count: DESCRIPTOR_POOL_SETS,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: DESCRIPTOR_POOL_SETS,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(DESCRIPTOR_POOL_SETS);

        unsafe {
            device.create_descriptor_pool(&info, None).map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create descriptor pool: {:?}", e);
                vk_result_to_error("create descriptor pool", e)
            })
        }
    }

    /// The queue a submission targets (compute falls back to graphics)
    pub(crate) fn queue(&self, kind: QueueKind) -> &Queue {
        match (kind, &self.compute) {
            (QueueKind::Compute, Some(compute)) => compute,
            _ => &self.graphics,
        }
    }

    // ===== SWAPCHAIN =====

    /// Build (or rebuild) the swap chain and re-register its images and views
    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<SwapchainInfo> {
        let ctx = SurfaceContext {
            instance: &self.instance,
            device: &self.device,
            physical_device: self.physical_device,
            surface_loader: &self.surface_loader,
            surface: self.surface,
        };
        let new_swapchain = Swapchain::new(&ctx, width, height, self.swapchain.as_ref())?;

        for image in self.swapchain_info.images.drain(..) {
            self.images.remove(image);
        }
        for view in self.swapchain_info.image_views.drain(..) {
            self.image_views.remove(view);
        }
        if let Some(mut old) = self.swapchain.take() {
            old.destroy(&self.device);
        }

        let extent = new_swapchain.extent;
        let usage = ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST;
        let mut info = SwapchainInfo {
            format: new_swapchain.format,
            width: extent.width,
            height: extent.height,
            images: Vec::with_capacity(new_swapchain.images.len()),
            image_views: Vec::with_capacity(new_swapchain.views.len()),
        };
        for (&image, &view) in new_swapchain.images.iter().zip(&new_swapchain.views) {
            info.images.push(self.images.insert(VkImage {
                image,
                allocation: None,
                desc: ImageDesc::new_2d(extent.width, extent.height, new_swapchain.format, usage),
            }));
            info.image_views.push(self.image_views.insert(VkImageView { view, owned: false }));
        }

        self.swapchain = Some(new_swapchain);
        self.swapchain_info = info.clone();
        Ok(info)
    }

    fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("No swapchain".to_string()))
    }

    // ===== SYNCHRONIZATION =====

    pub(crate) fn semaphore(&self, semaphore: SemaphoreHandle) -> Result<vk::Semaphore> {
        self.semaphores
            .get(semaphore)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown semaphore".to_string()))
    }

    pub(crate) fn fence(&self, fence: FenceHandle) -> Result<vk::Fence> {
        self.fences
            .get(fence)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown fence".to_string()))
    }

    /// Release a memory allocation, logging instead of failing
    pub(crate) fn free_allocation(&mut self, allocation: Allocation) {
        if let Err(e) = self.allocator.free(allocation) {
            engine_warn!("laugh::vulkan", "Failed to free GPU allocation: {}", e);
        }
    }
}

impl GraphicsDevice for VulkanDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn find_supported_format(&self, candidates: &[Format], feature: FormatFeature) -> Result<Format> {
        let required = format_feature_to_vk(feature);
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let properties = unsafe {
                    self.instance
                        .get_physical_device_format_properties(self.physical_device, format_to_vk(format))
                };
                properties.optimal_tiling_features.contains(required)
            })
            .ok_or_else(|| {
                engine_error!("laugh::vulkan", "None of {:?} supports {:?}", candidates, feature);
                Error::InitializationFailed(format!("No supported format for {:?}", feature))
            })
    }

    // ===== IMAGES =====

    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle> {
        self.create_image_impl(desc)
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.destroy_image_impl(image)
    }

    fn create_image_view(&mut self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        self.create_image_view_impl(image, desc)
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        if let Some(entry) = self.image_views.remove(view) {
            if entry.owned {
                unsafe { self.device.destroy_image_view(entry.view, None) };
            }
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        self.create_sampler_impl(desc)
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        if let Some(sampler) = self.samplers.remove(sampler) {
            unsafe { self.device.destroy_sampler(sampler, None) };
        }
    }

    fn upload_image(&mut self, image: ImageHandle, data: &ImageData, final_layout: ImageLayout) -> Result<()> {
        self.upload_image_impl(image, data, final_layout)
    }

    fn read_image(&mut self, image: ImageHandle) -> Result<ImageData> {
        self.read_image_impl(image)
    }

    fn transition_image_layout(
        &mut self,
        image: ImageHandle,
        range: SubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()> {
        self.transition_image_layout_impl(image, range, old_layout, new_layout)
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        self.create_buffer_impl(desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.write_buffer_impl(buffer, offset, data)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(mut entry) = self.buffers.remove(buffer) {
            unsafe { self.device.destroy_buffer(entry.buffer, None) };
            if let Some(allocation) = entry.allocation.take() {
                self.free_allocation(allocation);
            }
        }
    }

    // ===== RENDER PASSES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        self.create_render_pass_impl(desc)
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        if let Some(render_pass) = self.render_passes.remove(render_pass) {
            unsafe { self.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        self.create_framebuffer_impl(desc)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(framebuffer) = self.framebuffers.remove(framebuffer) {
            unsafe { self.device.destroy_framebuffer(framebuffer, None) };
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle> {
        self.create_descriptor_set_layout_impl(desc)
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) {
        if let Some(entry) = self.descriptor_set_layouts.remove(layout) {
            unsafe { self.device.destroy_descriptor_set_layout(entry.layout, None) };
        }
    }

    fn allocate_descriptor_set(&mut self, layout: DescriptorSetLayoutHandle) -> Result<DescriptorSetHandle> {
        self.allocate_descriptor_set_impl(layout)
    }

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        self.update_descriptor_set_impl(set, writes)
    }

    fn free_descriptor_set(&mut self, set: DescriptorSetHandle) {
        if let Some(entry) = self.descriptor_sets.remove(set) {
            if let Err(e) = unsafe { self.device.free_descriptor_sets(entry.pool, &[entry.set]) } {
                engine_warn!("laugh::vulkan", "Failed to free descriptor set: {:?}", e);
            }
        }
    }

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&mut self, desc: &ShaderModuleDesc) -> Result<ShaderModuleHandle> {
        self.create_shader_module_impl(desc)
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        if let Some(entry) = self.shader_modules.remove(module) {
            unsafe { self.device.destroy_shader_module(entry.module, None) };
        }
    }

    fn shader_interface(&self, module: ShaderModuleHandle) -> Result<ShaderInterface> {
        self.shader_modules
            .get(module)
            .map(|entry| entry.interface.clone())
            .ok_or_else(|| Error::InvalidResource("Unknown shader module".to_string()))
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        self.create_pipeline_layout_impl(desc)
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle) {
        if let Some(layout) = self.pipeline_layouts.remove(layout) {
            unsafe { self.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        self.create_graphics_pipeline_impl(desc)
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> Result<PipelineHandle> {
        self.create_compute_pipeline_impl(desc)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        if let Some(pipeline) = self.pipelines.remove(pipeline) {
            unsafe { self.device.destroy_pipeline(pipeline, None) };
        }
    }

    // ===== SYNCHRONIZATION =====

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_result_to_error("create semaphore", e))?;
        Ok(self.semaphores.insert(semaphore))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        if let Some(semaphore) = self.semaphores.remove(semaphore) {
            unsafe { self.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| vk_result_to_error("create fence", e))?;
        Ok(self.fences.insert(fence))
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if let Some(fence) = self.fences.remove(fence) {
            unsafe { self.device.destroy_fence(fence, None) };
        }
    }

    fn wait_for_fence(&mut self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        let fence = self.fence(fence)?;
        match unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::BackendError(format!(
                "Fence not signaled within {} ns",
                timeout_ns
            ))),
            Err(e) => Err(vk_result_to_error("wait for fence", e)),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<()> {
        let fence = self.fence(fence)?;
        unsafe { self.device.reset_fences(&[fence]) }.map_err(|e| vk_result_to_error("reset fence", e))
    }

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle> {
        self.allocate_command_buffer_impl(queue)
    }

    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle) {
        if let Some(entry) = self.command_buffers.remove(command_buffer) {
            unsafe { self.device.free_command_buffers(entry.pool, &[entry.buffer]) };
        }
    }

    fn begin_command_buffer(&mut self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()> {
        self.begin_command_buffer_impl(command_buffer, usage)
    }

    fn record(&mut self, command_buffer: CommandBufferHandle, command: &Command) -> Result<()> {
        self.record_impl(command_buffer, command)
    }

    fn end_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        self.end_command_buffer_impl(command_buffer)
    }

    fn submit(&mut self, submit: &SubmitInfo) -> Result<()> {
        self.submit_impl(submit)
    }

    // ===== SWAPCHAIN =====

    fn swapchain_info(&self) -> SwapchainInfo {
        self.swapchain_info.clone()
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<SwapchainInfo> {
        self.wait_idle()?;
        self.rebuild_swapchain(width, height)
    }

    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquireResult> {
        let signal = self.semaphore(signal)?;
        self.swapchain()?.acquire(signal, timeout_ns)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus> {
        let wait = self.semaphore(wait)?;
        self.swapchain()?.present(self.present_queue, image_index, wait)
    }

    // ===== LIFETIME =====

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| vk_result_to_error("wait idle", e))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Objects still alive in the arenas, dependents first
            for (_, pipeline) in self.pipelines.drain() {
                self.device.destroy_pipeline(pipeline, None);
            }
            for (_, layout) in self.pipeline_layouts.drain() {
                self.device.destroy_pipeline_layout(layout, None);
            }
            for (_, entry) in self.shader_modules.drain() {
                self.device.destroy_shader_module(entry.module, None);
            }
            self.descriptor_sets.clear();
            for pool in self.descriptor_pools.drain(..) {
                self.device.destroy_descriptor_pool(pool, None);
            }
            for (_, entry) in self.descriptor_set_layouts.drain() {
                self.device.destroy_descriptor_set_layout(entry.layout, None);
            }
            for (_, framebuffer) in self.framebuffers.drain() {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            for (_, render_pass) in self.render_passes.drain() {
                self.device.destroy_render_pass(render_pass, None);
            }
            for (_, entry) in self.image_views.drain() {
                if entry.owned {
                    self.device.destroy_image_view(entry.view, None);
                }
            }
            for (_, sampler) in self.samplers.drain() {
                self.device.destroy_sampler(sampler, None);
            }
            let images: Vec<VkImage> = self.images.drain().map(|(_, image)| image).collect();
            for mut image in images {
                if let Some(allocation) = image.allocation.take() {
                    self.device.destroy_image(image.image, None);
                    self.free_allocation(allocation);
                }
            }
            let buffers: Vec<VkBuffer> = self.buffers.drain().map(|(_, buffer)| buffer).collect();
            for mut buffer in buffers {
                self.device.destroy_buffer(buffer.buffer, None);
                if let Some(allocation) = buffer.allocation.take() {
                    self.free_allocation(allocation);
                }
            }
            for (_, semaphore) in self.semaphores.drain() {
                self.device.destroy_semaphore(semaphore, None);
            }
            for (_, fence) in self.fences.drain() {
                self.device.destroy_fence(fence, None);
            }
            self.device.destroy_fence(self.upload_fence, None);
            self.command_buffers.clear();
            self.device.destroy_command_pool(self.graphics.command_pool, None);
            if let Some(compute) = &self.compute {
                self.device.destroy_command_pool(compute.command_pool, None);
            }

            // 2. Swap chain (its images are not allocator-owned)
            if let Some(mut swapchain) = self.swapchain.take() {
                swapchain.destroy(&self.device);
            }

            // 3. Allocator frees its memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 4. No callbacks during teardown
            crate::debug::cleanup_debug_config();
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            // 5. Device, surface, instance
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}
