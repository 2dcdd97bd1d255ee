/// Image, image view and sampler descriptors

use bitflags::bitflags;
use crate::device::Format;

bitflags! {
    /// How an image may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Undefined layout (initial state, contents discarded)
    Undefined,
    /// General layout (storage image writes)
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    /// Layout for presenting to swapchain
    PresentSrc,
}

/// Aspect of an image a view or barrier touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
}

impl ImageAspect {
    pub fn for_format(format: Format) -> Self {
        if format.is_depth() { ImageAspect::Depth } else { ImageAspect::Color }
    }
}

/// Mip/layer window of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl SubresourceRange {
    /// Every mip and layer of an image with the given counts
    pub fn full(mip_count: u32, layer_count: u32) -> Self {
        Self { base_mip: 0, mip_count, base_layer: 0, layer_count }
    }
}

/// Descriptor for creating an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub usage: ImageUsage,
    pub mip_levels: u32,
    /// 6 for cube maps
    pub array_layers: u32,
    /// Allows cube views over 6 layers
    pub cube_compatible: bool,
}

impl ImageDesc {
    /// Single-mip 2D image
    pub fn new_2d(width: u32, height: u32, format: Format, usage: ImageUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            mip_levels: 1,
            array_layers: 1,
            cube_compatible: false,
        }
    }

    /// Square cube map with `mip_levels` mips
    pub fn new_cube(size: u32, format: Format, usage: ImageUsage, mip_levels: u32) -> Self {
        Self {
            width: size,
            height: size,
            format,
            usage,
            mip_levels,
            array_layers: 6,
            cube_compatible: true,
        }
    }

    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange::full(self.mip_levels, self.array_layers)
    }
}

/// Image view dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageViewType {
    D2,
    D2Array,
    Cube,
}

/// Descriptor for creating an image view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageViewDesc {
    pub view_type: ImageViewType,
    pub format: Format,
    pub aspect: ImageAspect,
    pub range: SubresourceRange,
}

// ===== SAMPLER =====

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Mip selection between levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

/// Addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: MipmapMode,
    pub address_mode: AddressMode,
    pub max_lod: f32,
}

impl SamplerDesc {
    /// Nearest, clamped, no mips (attachments read texel-exact)
    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: MipmapMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
            max_lod: 0.0,
        }
    }

    /// Linear, clamped, no mips (bloom buffers)
    pub fn linear_clamp() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
            max_lod: 0.0,
        }
    }

    /// Trilinear over `mip_levels` mips
    pub fn trilinear(mip_levels: u32, address_mode: AddressMode) -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Linear,
            address_mode,
            max_lod: mip_levels as f32,
        }
    }
}

// ===== HOST-SIDE IMAGE DATA =====

/// Tightly packed image contents, layer-major then mip
///
/// Byte order: for each layer, for each mip level, `width >> mip` x
/// `height >> mip` texels (clamped to 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub is_cube: bool,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Byte size of one mip level of one layer
    pub fn mip_size(&self, mip: u32) -> usize {
        mip_byte_size(self.width, self.height, self.format, mip)
    }

    /// Expected total byte size for the declared shape
    pub fn expected_size(&self) -> usize {
        expected_image_size(self.width, self.height, self.format, self.mip_levels, self.array_layers)
    }

    /// Byte offset of (layer, mip) inside `bytes`
    pub fn offset_of(&self, layer: u32, mip: u32) -> usize {
        let per_layer: usize = (0..self.mip_levels).map(|m| self.mip_size(m)).sum();
        let within: usize = (0..mip).map(|m| self.mip_size(m)).sum();
        per_layer * layer as usize + within
    }

    pub fn image_desc(&self, usage: ImageUsage) -> ImageDesc {
        ImageDesc {
            width: self.width,
            height: self.height,
            format: self.format,
            usage,
            mip_levels: self.mip_levels,
            array_layers: self.array_layers,
            cube_compatible: self.is_cube,
        }
    }
}

/// Byte size of one mip level of one layer
pub fn mip_byte_size(width: u32, height: u32, format: Format, mip: u32) -> usize {
    let w = width.checked_shr(mip).unwrap_or(0).max(1) as usize;
    let h = height.checked_shr(mip).unwrap_or(0).max(1) as usize;
    w * h * format.bytes_per_pixel() as usize
}

/// Byte size of a full image with the given shape
pub fn expected_image_size(width: u32, height: u32, format: Format, mip_levels: u32, array_layers: u32) -> usize {
    let per_layer: usize = (0..mip_levels).map(|m| mip_byte_size(width, height, format, m)).sum();
    per_layer * array_layers as usize
}
