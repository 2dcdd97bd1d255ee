/// Swapchain - presentation images, acquisition and presentation
///
/// The device owns the surface and registers the swap chain images in its
/// image arena; this type only holds the native swap chain objects.

use ash::vk;
use laugh_engine::laugh::{Error, Result};
use laugh_engine::laugh::device::{AcquireResult, Format, PresentStatus};
use laugh_engine::{engine_debug, engine_error};

use crate::vulkan_format::{vk_result_to_error, vk_to_format};

pub(crate) struct Swapchain {
    loader: ash::khr::swapchain::Device,
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) format: Format,
    pub(crate) extent: vk::Extent2D,
}

/// Everything needed to (re)build a swap chain for a surface
pub(crate) struct SurfaceContext<'a> {
    pub instance: &'a ash::Instance,
    pub device: &'a ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl Swapchain {
    /// Create a swap chain for the surface's current size
    ///
    /// `old` is retired by the driver once the new one exists; the caller
    /// destroys it afterwards.
    pub(crate) fn new(
        ctx: &SurfaceContext<'_>,
        width: u32,
        height: u32,
        old: Option<&Swapchain>,
    ) -> Result<Self> {
        unsafe {
            let capabilities = ctx
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let surface_formats = ctx
                .surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| {
                    engine_error!("laugh::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;

            let (surface_format, format) = choose_surface_format(&surface_formats).ok_or_else(|| {
                engine_error!("laugh::vulkan", "No presentable surface format among {:?}", surface_formats);
                Error::InitializationFailed("No supported surface format".to_string())
            })?;

            let Some(extent) = choose_extent(&capabilities, width, height) else {
                engine_debug!("laugh::vulkan", "Surface has no area, keeping the current swap chain");
                return Err(Error::SurfaceOutOfDate);
            };

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |o| o.swapchain));

            let loader = ash::khr::swapchain::Device::new(ctx.instance, ctx.device);
            let swapchain = loader.create_swapchain(&create_info, None).map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to create swapchain: {:?}", e);
                vk_result_to_error("create swapchain", e)
            })?;

            let images = loader.get_swapchain_images(swapchain).map_err(|e| {
                engine_error!("laugh::vulkan", "Failed to get swapchain images: {:?}", e);
                vk_result_to_error("get swapchain images", e)
            })?;

            let mut views = Vec::with_capacity(images.len());
            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                match ctx.device.create_image_view(&view_info, None) {
                    Ok(view) => views.push(view),
                    Err(e) => {
                        for view in views {
                            ctx.device.destroy_image_view(view, None);
                        }
                        loader.destroy_swapchain(swapchain, None);
                        return Err(vk_result_to_error("create swapchain image view", e));
                    }
                }
            }

            engine_debug!(
                "laugh::vulkan",
                "Swapchain {}x{} {:?}, {} images",
                extent.width, extent.height, format, images.len()
            );

            Ok(Self { loader, swapchain, images, views, format, extent })
        }
    }

    pub(crate) fn acquire(&self, signal: vk::Semaphore, timeout_ns: u64) -> Result<AcquireResult> {
        let result = unsafe {
            self.loader.acquire_next_image(self.swapchain, timeout_ns, signal, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireResult::Ready { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(vk_result_to_error("acquire swapchain image", e)),
        }
    }

    pub(crate) fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<PresentStatus> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(vk_result_to_error("present swapchain image", e)),
        }
    }

    /// Destroy the views and the swap chain (the images belong to it)
    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
            self.images.clear();
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}

/// sRGB formats first, then any other format the engine can present to
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, Format)> {
    let preferred = formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB);
    preferred
        .into_iter()
        .chain(formats.iter())
        .find_map(|f| vk_to_format(f.format).map(|format| (*f, format)))
}

/// The surface's size when it dictates one, otherwise the requested size clamped
///
/// `None` while the surface has no area (minimized window).
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> Option<vk::Extent2D> {
    let extent = if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    };
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// One more than the minimum, bounded by the maximum (0 means unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
