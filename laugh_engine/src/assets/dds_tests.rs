//! Unit tests for the DDS codec

use crate::assets::dds::{decode, dxgi_format, encode, format_from_dxgi};
use crate::device::{Format, ImageData};
use crate::error::Error;

fn patterned(width: u32, height: u32, format: Format, mip_levels: u32, array_layers: u32, is_cube: bool) -> ImageData {
    let mut image = ImageData { width, height, format, mip_levels, array_layers, is_cube, bytes: Vec::new() };
    image.bytes = (0..image.expected_size()).map(|i| (i * 7 % 253) as u8).collect();
    image
}

// ============================================================================
// ROUND TRIP
// ============================================================================

#[test]
fn test_brdf_lut_round_trip_is_byte_exact() {
    let lut = patterned(256, 256, Format::R32G32_SFLOAT, 1, 1, false);
    let decoded = decode(&encode(&lut).unwrap()).unwrap();
    assert_eq!(decoded, lut);
}

#[test]
fn test_cube_with_full_mip_chain_round_trip() {
    let cube = patterned(16, 16, Format::R32G32B32A32_SFLOAT, 5, 6, true);
    let file = encode(&cube).unwrap();
    let decoded = decode(&file).unwrap();

    assert!(decoded.is_cube);
    assert_eq!(decoded.array_layers, 6);
    assert_eq!(decoded.mip_levels, 5);
    assert_eq!(decoded.bytes, cube.bytes);
}

#[test]
fn test_face_order_is_layer_major() {
    let cube = patterned(4, 4, Format::R8G8B8A8_UNORM, 3, 6, true);
    let decoded = decode(&encode(&cube).unwrap()).unwrap();
    let offset = decoded.offset_of(2, 1);
    let size = decoded.mip_size(1);
    assert_eq!(&decoded.bytes[offset..offset + size], &cube.bytes[offset..offset + size]);
}

// ============================================================================
// HEADER
// ============================================================================

#[test]
fn test_header_fields() {
    let file = encode(&patterned(8, 4, Format::R16G16B16A16_SFLOAT, 2, 1, false)).unwrap();
    assert_eq!(&file[0..4], b"DDS ");
    assert_eq!(&file[84..88], b"DX10");
    // Data starts after magic + header + DX10 header
    assert_eq!(file.len(), 4 + 124 + 20 + 8 * 4 * 8 + 4 * 2 * 8);
}

#[test]
fn test_format_codes_are_symmetric() {
    for format in [Format::R32G32_SFLOAT, Format::R32G32B32A32_SFLOAT, Format::R16G16B16A16_SFLOAT, Format::R8G8B8A8_UNORM] {
        let code = dxgi_format(format).unwrap();
        assert_eq!(format_from_dxgi(code), Some(format));
    }
    assert_eq!(dxgi_format(Format::D32_SFLOAT), None);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_encode_rejects_size_mismatch() {
    let mut image = patterned(4, 4, Format::R8G8B8A8_UNORM, 1, 1, false);
    image.bytes.pop();
    assert!(matches!(encode(&image), Err(Error::AssetError(_))));
}

#[test]
fn test_decode_rejects_truncated_data() {
    let mut file = encode(&patterned(8, 8, Format::R8G8B8A8_UNORM, 1, 1, false)).unwrap();
    file.truncate(file.len() - 1);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));
}

#[test]
fn test_decode_rejects_bad_magic() {
    let mut file = encode(&patterned(2, 2, Format::R8G8B8A8_UNORM, 1, 1, false)).unwrap();
    file[0] = b'X';
    assert!(decode(&file).is_err());
    assert!(decode(&[0u8; 8]).is_err());
}

// ============================================================================
// CORRUPT HEADERS
// ============================================================================

// File offsets: mip count sits at 28, width at 16, the DX10 array size at 140
fn patch_u32(file: &mut [u8], offset: usize, value: u32) {
    file[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn test_decode_rejects_excessive_mip_count() {
    let mut file = encode(&patterned(4, 4, Format::R8G8B8A8_UNORM, 1, 1, false)).unwrap();
    patch_u32(&mut file, 28, 40);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));

    // 4x4 holds at most 3 levels
    patch_u32(&mut file, 28, 4);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));
}

#[test]
fn test_decode_rejects_zero_extent() {
    let mut file = encode(&patterned(4, 4, Format::R8G8B8A8_UNORM, 1, 1, false)).unwrap();
    patch_u32(&mut file, 16, 0);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));
}

#[test]
fn test_decode_rejects_overflowing_array_size() {
    let mut file = encode(&patterned(4, 4, Format::R8G8B8A8_UNORM, 1, 6, true)).unwrap();
    patch_u32(&mut file, 140, u32::MAX / 2);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));

    patch_u32(&mut file, 140, 1 << 28);
    assert!(matches!(decode(&file), Err(Error::AssetError(_))));
}
