/// Image and vertex attribute formats

/// Texture and vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Depth formats
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
    D24_UNORM_S8_UINT,
}

impl Format {
    /// Size of one texel (or one vertex attribute) in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::R32_SFLOAT
            | Format::D32_SFLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::R16G16B16A16_SFLOAT | Format::R32G32_SFLOAT | Format::D32_SFLOAT_S8_UINT => 8,
            Format::R32G32B32_SFLOAT => 12,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D32_SFLOAT | Format::D32_SFLOAT_S8_UINT | Format::D24_UNORM_S8_UINT)
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D32_SFLOAT_S8_UINT | Format::D24_UNORM_S8_UINT)
    }
}

/// What a format must support for `find_supported_format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFeature {
    ColorAttachment,
    DepthStencilAttachment,
    SampledImage,
    StorageImage,
}
