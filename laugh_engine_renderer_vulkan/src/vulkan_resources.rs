/// Images, image views, samplers and buffers, plus host transfers
///
/// Uploads and readbacks go through a host-visible staging buffer and a one-shot
/// command buffer on the graphics queue, waited on before returning.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation as GpuMemoryLocation;
use laugh_engine::laugh::{Error, Result};
use laugh_engine::laugh::device::*;
use laugh_engine::{engine_bail, engine_error, engine_trace};

use crate::vulkan_device::{VkBuffer, VkImage, VkImageView, VulkanDevice};
use crate::vulkan_format::*;

/// Host-visible transfer buffer released after a one-shot copy
struct Staging {
    buffer: vk::Buffer,
    allocation: Allocation,
}

impl VulkanDevice {
    // ===== IMAGES =====

    pub(crate) fn create_image_impl(&mut self, desc: &ImageDesc) -> Result<ImageHandle> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 || desc.array_layers == 0 {
            engine_bail!("laugh::vulkan", "Image with empty extent: {:?}", desc);
        }

        let families = sharing_families(desc.usage, self.graphics.family, self.compute.as_ref().map(|q| q.family));
        let sharing_mode = if families.is_empty() { vk::SharingMode::EXCLUSIVE } else { vk::SharingMode::CONCURRENT };

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.cube_compatible {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }
        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(sharing_mode)
            .queue_family_indices(&families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = self
                .device
                .create_image(&image_info, None)
                .map_err(|e| vk_result_to_error("create image", e))?;
            let requirements = self.device.get_image_memory_requirements(image);

            let allocation = match self.allocator.allocate(&AllocationCreateDesc {
                name: "image",
                requirements,
                location: GpuMemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(allocation_error(e));
                }
            };

            if let Err(e) = self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.device.destroy_image(image, None);
                self.free_allocation(allocation);
                return Err(vk_result_to_error("bind image memory", e));
            }

            Ok(self.images.insert(VkImage { image, allocation: Some(allocation), desc: desc.clone() }))
        }
    }

    pub(crate) fn destroy_image_impl(&mut self, image: ImageHandle) {
        let Some(entry) = self.images.get_mut(image) else {
            return;
        };
        // Swap chain images are released with the swap chain
        let Some(allocation) = entry.allocation.take() else {
            return;
        };
        let vk_image = entry.image;
        self.images.remove(image);
        unsafe { self.device.destroy_image(vk_image, None) };
        self.free_allocation(allocation);
    }

    pub(crate) fn image(&self, image: ImageHandle) -> Result<&VkImage> {
        self.images
            .get(image)
            .ok_or_else(|| Error::InvalidResource("Unknown image".to_string()))
    }

    pub(crate) fn create_image_view_impl(&mut self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let entry = self.image(image)?;
        let range = desc.range;
        if range.base_mip + range.mip_count > entry.desc.mip_levels
            || range.base_layer + range.layer_count > entry.desc.array_layers
        {
            engine_bail!(
                "laugh::vulkan",
                "View range {:?} outside image ({} mips, {} layers)",
                range, entry.desc.mip_levels, entry.desc.array_layers
            );
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(entry.image)
            .view_type(view_type_to_vk(desc.view_type))
            .format(format_to_vk(desc.format))
            .components(vk::ComponentMapping::default())
            .subresource_range(subresource_range_to_vk(range, aspect_to_vk(desc.aspect)));

        let view = unsafe { self.device.create_image_view(&view_info, None) }
            .map_err(|e| vk_result_to_error("create image view", e))?;
        Ok(self.image_views.insert(VkImageView { view, owned: true }))
    }

    pub(crate) fn image_view(&self, view: ImageViewHandle) -> Result<vk::ImageView> {
        self.image_views
            .get(view)
            .map(|entry| entry.view)
            .ok_or_else(|| Error::InvalidResource("Unknown image view".to_string()))
    }

    pub(crate) fn create_sampler_impl(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode))
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .min_lod(0.0)
            .max_lod(desc.max_lod)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK);

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }
            .map_err(|e| vk_result_to_error("create sampler", e))?;
        Ok(self.samplers.insert(sampler))
    }

    pub(crate) fn sampler(&self, sampler: SamplerHandle) -> Result<vk::Sampler> {
        self.samplers
            .get(sampler)
            .copied()
            .ok_or_else(|| Error::InvalidResource("Unknown sampler".to_string()))
    }

    // ===== TRANSFERS =====

    pub(crate) fn upload_image_impl(&mut self, image: ImageHandle, data: &ImageData, final_layout: ImageLayout) -> Result<()> {
        let entry = self.image(image)?;
        let desc = entry.desc.clone();
        let vk_image = entry.image;

        if data.width != desc.width
            || data.height != desc.height
            || data.format != desc.format
            || data.mip_levels != desc.mip_levels
            || data.array_layers != desc.array_layers
        {
            engine_bail!(
                "laugh::vulkan",
                "Image data {}x{} {:?} ({} mips, {} layers) does not match image {:?}",
                data.width, data.height, data.format, data.mip_levels, data.array_layers, desc
            );
        }
        if data.bytes.len() != data.expected_size() {
            return Err(Error::AssetError(format!(
                "Image data holds {} bytes, expected {}",
                data.bytes.len(),
                data.expected_size()
            )));
        }

        let staging = self.create_filled_staging(&data.bytes)?;

        let aspect = barrier_aspect(desc.format);
        let copy_mask = copy_aspect(desc.format);
        let regions = copy_regions(data, copy_mask);
        let range = subresource_range_to_vk(desc.full_range(), aspect);
        let staging_buffer = staging.buffer;

        let result = self.one_shot(|device, cb| unsafe {
            record_layout_barrier(device, cb, vk_image, range, ImageLayout::Undefined, ImageLayout::TransferDst);
            device.cmd_copy_buffer_to_image(
                cb,
                staging_buffer,
                vk_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
            if final_layout != ImageLayout::TransferDst {
                record_layout_barrier(device, cb, vk_image, range, ImageLayout::TransferDst, final_layout);
            }
        });
        self.destroy_staging(staging);

        engine_trace!(
            "laugh::vulkan",
            "Uploaded {} bytes ({} regions) into {:?} image",
            data.bytes.len(), regions.len(), desc.format
        );
        result
    }

    pub(crate) fn read_image_impl(&mut self, image: ImageHandle) -> Result<ImageData> {
        let entry = self.image(image)?;
        let desc = entry.desc.clone();
        let vk_image = entry.image;

        let mut data = ImageData {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            is_cube: desc.cube_compatible,
            bytes: Vec::new(),
        };
        let size = data.expected_size();
        let regions = copy_regions(&data, copy_aspect(desc.format));

        let staging = self.create_staging(size as u64, GpuMemoryLocation::GpuToCpu)?;
        let staging_buffer = staging.buffer;
        let result = self.one_shot(|device, cb| unsafe {
            device.cmd_copy_image_to_buffer(
                cb,
                vk_image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                staging_buffer,
                &regions,
            );
        });

        if let Err(e) = result {
            self.destroy_staging(staging);
            return Err(e);
        }
        match staging.allocation.mapped_slice() {
            Some(mapped) => data.bytes = mapped[..size].to_vec(),
            None => {
                self.destroy_staging(staging);
                engine_bail!("laugh::vulkan", "Readback buffer is not host visible");
            }
        }
        self.destroy_staging(staging);
        Ok(data)
    }

    pub(crate) fn transition_image_layout_impl(
        &mut self,
        image: ImageHandle,
        range: SubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()> {
        let entry = self.image(image)?;
        let vk_image = entry.image;
        let range = subresource_range_to_vk(range, barrier_aspect(entry.desc.format));
        self.one_shot(|device, cb| unsafe {
            record_layout_barrier(device, cb, vk_image, range, old_layout, new_layout);
        })
    }

    // ===== BUFFERS =====

    pub(crate) fn create_buffer_impl(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        if desc.size == 0 {
            engine_bail!("laugh::vulkan", "Buffer with zero size");
        }

        let mut usage = buffer_usage_to_vk(desc.usage);
        if desc.location == MemoryLocation::GpuOnly {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        let location = match desc.location {
            MemoryLocation::GpuOnly => GpuMemoryLocation::GpuOnly,
            MemoryLocation::CpuToGpu => GpuMemoryLocation::CpuToGpu,
        };
        let (buffer, allocation) = self.allocate_buffer(desc.size, usage, location, "buffer")?;
        Ok(self.buffers.insert(VkBuffer { buffer, allocation: Some(allocation), desc: desc.clone() }))
    }

    pub(crate) fn buffer(&self, buffer: BufferHandle) -> Result<&VkBuffer> {
        self.buffers
            .get(buffer)
            .ok_or_else(|| Error::InvalidResource("Unknown buffer".to_string()))
    }

    pub(crate) fn write_buffer_impl(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let entry = self.buffer(buffer)?;
        let (dst, size, location) = (entry.buffer, entry.desc.size, entry.desc.location);
        let end = offset + data.len() as u64;
        if end > size {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                size
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        if location == MemoryLocation::CpuToGpu {
            let entry = self
                .buffers
                .get_mut(buffer)
                .ok_or_else(|| Error::InvalidResource("Unknown buffer".to_string()))?;
            let mapped = entry
                .allocation
                .as_mut()
                .and_then(|allocation| allocation.mapped_slice_mut())
                .ok_or_else(|| Error::BackendError("Host-visible buffer is not mapped".to_string()))?;
            mapped[offset as usize..end as usize].copy_from_slice(data);
            return Ok(());
        }

        let staging = self.create_filled_staging(data)?;
        let src = staging.buffer;
        let region = vk::BufferCopy { src_offset: 0, dst_offset: offset, size: data.len() as u64 };
        let result = self.one_shot(|device, cb| unsafe {
            device.cmd_copy_buffer(cb, src, dst, &[region]);
        });
        self.destroy_staging(staging);
        result
    }

    // ===== HELPERS =====

    fn allocate_buffer(
        &mut self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: GpuMemoryLocation,
        name: &str,
    ) -> Result<(vk::Buffer, Allocation)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = self
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| vk_result_to_error("create buffer", e))?;
            let requirements = self.device.get_buffer_memory_requirements(buffer);

            let allocation = match self.allocator.allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    engine_error!("laugh::vulkan", "Failed to allocate {} bytes for {}: {}", size, name, e);
                    return Err(allocation_error(e));
                }
            };

            if let Err(e) = self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.device.destroy_buffer(buffer, None);
                self.free_allocation(allocation);
                return Err(vk_result_to_error("bind buffer memory", e));
            }
            Ok((buffer, allocation))
        }
    }

    fn create_staging(&mut self, size: u64, location: GpuMemoryLocation) -> Result<Staging> {
        let (buffer, allocation) = self.allocate_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            location,
            "staging",
        )?;
        Ok(Staging { buffer, allocation })
    }

    /// Host-visible staging buffer holding a copy of `bytes`
    fn create_filled_staging(&mut self, bytes: &[u8]) -> Result<Staging> {
        let mut staging = self.create_staging(bytes.len() as u64, GpuMemoryLocation::CpuToGpu)?;
        match staging.allocation.mapped_slice_mut() {
            Some(mapped) => {
                mapped[..bytes.len()].copy_from_slice(bytes);
                Ok(staging)
            }
            None => {
                self.destroy_staging(staging);
                engine_bail!("laugh::vulkan", "Staging buffer is not host visible");
            }
        }
    }

    fn destroy_staging(&mut self, staging: Staging) {
        unsafe { self.device.destroy_buffer(staging.buffer, None) };
        self.free_allocation(staging.allocation);
    }

    /// Record, submit and wait for a single-use command buffer on the graphics queue
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.graphics.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            let cb = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| vk_result_to_error("allocate one-shot command buffer", e))?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device
                    .begin_command_buffer(cb, &begin_info)
                    .map_err(|e| vk_result_to_error("begin one-shot command buffer", e))?;
                record(&self.device, cb);
                self.device
                    .end_command_buffer(cb)
                    .map_err(|e| vk_result_to_error("end one-shot command buffer", e))?;

                let command_buffers = [cb];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                self.device
                    .queue_submit(self.graphics.queue, &[submit_info], self.upload_fence)
                    .map_err(|e| vk_result_to_error("submit one-shot command buffer", e))?;
                self.device
                    .wait_for_fences(&[self.upload_fence], true, u64::MAX)
                    .map_err(|e| vk_result_to_error("wait for one-shot command buffer", e))?;
                self.device
                    .reset_fences(&[self.upload_fence])
                    .map_err(|e| vk_result_to_error("reset upload fence", e))
            })();

            self.device.free_command_buffers(self.graphics.command_pool, &[cb]);
            result
        }
    }
}

/// Buffer copies address a single aspect; depth/stencil images copy depth only
/// Queue families sharing an image concurrently; empty means exclusive to graphics
///
/// Storage images are written on the compute queue and read on the graphics
/// queue, so with a separate compute family they are shared by both.
pub(crate) fn sharing_families(usage: ImageUsage, graphics: u32, compute: Option<u32>) -> Vec<u32> {
    match compute {
        Some(compute) if compute != graphics && usage.contains(ImageUsage::STORAGE) => vec![graphics, compute],
        _ => Vec::new(),
    }
}

fn copy_aspect(format: Format) -> vk::ImageAspectFlags {
    if format.is_depth() { vk::ImageAspectFlags::DEPTH } else { vk::ImageAspectFlags::COLOR }
}

/// One copy region per (layer, mip), matching `ImageData`'s packing
pub(crate) fn copy_regions(data: &ImageData, aspect_mask: vk::ImageAspectFlags) -> Vec<vk::BufferImageCopy> {
    let mut regions = Vec::with_capacity((data.array_layers * data.mip_levels) as usize);
    for layer in 0..data.array_layers {
        for mip in 0..data.mip_levels {
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(data.offset_of(layer, mip) as u64)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level: mip,
                        base_array_layer: layer,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D {
                        width: (data.width >> mip).max(1),
                        height: (data.height >> mip).max(1),
                        depth: 1,
                    }),
            );
        }
    }
    regions
}

/// Record a full pipeline barrier moving `range` between two layouts
pub(crate) unsafe fn record_layout_barrier(
    device: &ash::Device,
    cb: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
) {
    let (src_access, src_stage) = layout_access_and_stage(old_layout);
    let (dst_access, dst_stage) = layout_access_and_stage(new_layout);
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(image_layout_to_vk(old_layout))
        .new_layout(image_layout_to_vk(new_layout))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    device.cmd_pipeline_barrier(
        cb,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

#[cfg(test)]
#[path = "vulkan_resources_tests.rs"]
mod tests;
