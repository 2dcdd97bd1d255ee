/// DDS container codec (DX10 extended header, uncompressed formats only)
///
/// Layout on disk: magic, 124-byte header, 20-byte DX10 header, then texel data
/// array-element-major, mip-minor. That is the same order `ImageData` keeps its
/// bytes in, so encode and decode are plain header work plus one copy.

use bytemuck::{Pod, Zeroable};

use crate::config::full_mip_count;
use crate::device::{Format, ImageData};
use crate::error::{Error, Result};

const DDS_MAGIC: u32 = 0x2053_4444; // "DDS "
const FOURCC_DX10: u32 = 0x3031_5844; // "DX10"

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;

const DDPF_FOURCC: u32 = 0x4;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;
const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0x200 | 0xFC00;

const DIMENSION_TEXTURE2D: u32 = 3;
const MISC_TEXTURECUBE: u32 = 0x4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DdsPixelFormat {
    size: u32,
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DdsHeader {
    size: u32,
    flags: u32,
    height: u32,
    width: u32,
    pitch_or_linear_size: u32,
    depth: u32,
    mip_map_count: u32,
    reserved1: [u32; 11],
    pixel_format: DdsPixelFormat,
    caps: u32,
    caps2: u32,
    caps3: u32,
    caps4: u32,
    reserved2: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DdsHeaderDx10 {
    dxgi_format: u32,
    resource_dimension: u32,
    misc_flag: u32,
    array_size: u32,
    misc_flags2: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<DdsHeader>();
const DX10_SIZE: usize = std::mem::size_of::<DdsHeaderDx10>();
const DATA_OFFSET: usize = 4 + HEADER_SIZE + DX10_SIZE;

// ===== FORMAT MAPPING =====

/// DXGI code of a format the codec can store
pub fn dxgi_format(format: Format) -> Option<u32> {
    match format {
        Format::R32G32B32A32_SFLOAT => Some(2),
        Format::R16G16B16A16_SFLOAT => Some(10),
        Format::R32G32_SFLOAT => Some(16),
        Format::R8G8B8A8_UNORM => Some(28),
        Format::R8G8B8A8_SRGB => Some(29),
        _ => None,
    }
}

/// Format of a DXGI code the codec can load
pub fn format_from_dxgi(code: u32) -> Option<Format> {
    match code {
        2 => Some(Format::R32G32B32A32_SFLOAT),
        10 => Some(Format::R16G16B16A16_SFLOAT),
        16 => Some(Format::R32G32_SFLOAT),
        28 => Some(Format::R8G8B8A8_UNORM),
        29 => Some(Format::R8G8B8A8_SRGB),
        _ => None,
    }
}

// ===== ENCODE / DECODE =====

/// Serialize an image (2D or cube, any mip count) into a DDS file
pub fn encode(image: &ImageData) -> Result<Vec<u8>> {
    let dxgi = dxgi_format(image.format)
        .ok_or_else(|| Error::AssetError(format!("DDS: cannot store format {:?}", image.format)))?;
    if image.bytes.len() != image.expected_size() {
        return Err(Error::AssetError(format!(
            "DDS: image holds {} bytes, shape needs {}",
            image.bytes.len(),
            image.expected_size()
        )));
    }
    if image.is_cube && image.array_layers % 6 != 0 {
        return Err(Error::AssetError(format!("DDS: cube image with {} layers", image.array_layers)));
    }

    let mut caps = DDSCAPS_TEXTURE;
    if image.mip_levels > 1 {
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if image.is_cube {
        caps |= DDSCAPS_COMPLEX;
    }

    let header = DdsHeader {
        size: HEADER_SIZE as u32,
        flags: DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PITCH | DDSD_PIXELFORMAT | DDSD_MIPMAPCOUNT,
        height: image.height,
        width: image.width,
        pitch_or_linear_size: image.width * image.format.bytes_per_pixel(),
        depth: 0,
        mip_map_count: image.mip_levels,
        reserved1: [0; 11],
        pixel_format: DdsPixelFormat {
            size: std::mem::size_of::<DdsPixelFormat>() as u32,
            flags: DDPF_FOURCC,
            four_cc: FOURCC_DX10,
            ..Zeroable::zeroed()
        },
        caps,
        caps2: if image.is_cube { DDSCAPS2_CUBEMAP_ALL_FACES } else { 0 },
        caps3: 0,
        caps4: 0,
        reserved2: 0,
    };
    let dx10 = DdsHeaderDx10 {
        dxgi_format: dxgi,
        resource_dimension: DIMENSION_TEXTURE2D,
        misc_flag: if image.is_cube { MISC_TEXTURECUBE } else { 0 },
        array_size: if image.is_cube { image.array_layers / 6 } else { image.array_layers },
        misc_flags2: 0,
    };

    let mut out = Vec::with_capacity(DATA_OFFSET + image.bytes.len());
    out.extend_from_slice(&DDS_MAGIC.to_le_bytes());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    out.extend_from_slice(bytemuck::bytes_of(&dx10));
    out.extend_from_slice(&image.bytes);
    Ok(out)
}

/// Parse a DDS file written with a DX10 header
pub fn decode(bytes: &[u8]) -> Result<ImageData> {
    if bytes.len() < DATA_OFFSET {
        return Err(Error::AssetError(format!("DDS: file too short ({} bytes)", bytes.len())));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != DDS_MAGIC {
        return Err(Error::AssetError("DDS: bad magic".to_string()));
    }

    let header: DdsHeader = bytemuck::pod_read_unaligned(&bytes[4..4 + HEADER_SIZE]);
    if header.size as usize != HEADER_SIZE {
        return Err(Error::AssetError(format!("DDS: bad header size {}", header.size)));
    }
    if header.pixel_format.flags & DDPF_FOURCC == 0 || header.pixel_format.four_cc != FOURCC_DX10 {
        return Err(Error::AssetError("DDS: only DX10 headers are supported".to_string()));
    }

    let dx10: DdsHeaderDx10 = bytemuck::pod_read_unaligned(&bytes[4 + HEADER_SIZE..DATA_OFFSET]);
    if dx10.resource_dimension != DIMENSION_TEXTURE2D {
        return Err(Error::AssetError(format!("DDS: unsupported dimension {}", dx10.resource_dimension)));
    }
    let format = format_from_dxgi(dx10.dxgi_format)
        .ok_or_else(|| Error::AssetError(format!("DDS: unsupported DXGI format {}", dx10.dxgi_format)))?;

    if header.width == 0 || header.height == 0 {
        return Err(Error::AssetError(format!("DDS: empty extent {}x{}", header.width, header.height)));
    }
    let mip_levels = header.mip_map_count.max(1);
    let max_mips = full_mip_count(header.width.max(header.height));
    if mip_levels > max_mips {
        return Err(Error::AssetError(format!(
            "DDS: {} mip levels for a {}x{} image (at most {})",
            mip_levels, header.width, header.height, max_mips
        )));
    }

    let is_cube = dx10.misc_flag & MISC_TEXTURECUBE != 0;
    let elements = dx10.array_size.max(1);
    let array_layers = if is_cube { elements.checked_mul(6) } else { Some(elements) }
        .ok_or_else(|| Error::AssetError(format!("DDS: array size {} overflows", dx10.array_size)))?;
    let image = ImageData {
        width: header.width,
        height: header.height,
        format,
        mip_levels,
        array_layers,
        is_cube,
        bytes: Vec::new(),
    };

    let data = &bytes[DATA_OFFSET..];
    let needed = checked_size(&image)
        .ok_or_else(|| Error::AssetError(format!("DDS: {}x{}x{} image size overflows", image.width, image.height, array_layers)))?;
    if data.len() < needed {
        return Err(Error::AssetError(format!("DDS: {} bytes of texel data, expected {}", data.len(), needed)));
    }
    Ok(ImageData { bytes: data[..needed].to_vec(), ..image })
}

/// Texel byte count of the declared shape, `None` on overflow
fn checked_size(image: &ImageData) -> Option<usize> {
    let bpp = image.format.bytes_per_pixel() as usize;
    let mut per_layer = 0usize;
    for mip in 0..image.mip_levels {
        let w = (image.width >> mip).max(1) as usize;
        let h = (image.height >> mip).max(1) as usize;
        per_layer = per_layer.checked_add(w.checked_mul(h)?.checked_mul(bpp)?)?;
    }
    per_layer.checked_mul(image.array_layers as usize)
}

#[cfg(test)]
#[path = "dds_tests.rs"]
mod tests;
