/// Uniform blob: one host arena for every small uniform structure
///
/// Structures are bump-allocated once at fixed, aligned offsets and live for the
/// renderer's lifetime. The CPU writes them in place; `upload` copies the used
/// prefix into the single device buffer once per frame. Descriptor sets point
/// at (buffer, offset, size) of each structure.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::config::{DisplayMode, PointLight, NUM_LIGHTS};
use crate::device::{BufferHandle, DescriptorResource, GraphicsDevice};
use crate::error::{Error, Result};

// ============================================================================
// Uniform structures (std140-compatible layouts)
// ============================================================================

/// View matrices of the six cube faces plus the shared 90 degree projection
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CubeViews {
    pub views: [Mat4; 6],
    pub projection: Mat4,
}

impl CubeViews {
    /// Faces in +X, -X, +Y, -Y, +Z, -Z order, seen from the origin
    pub fn from_origin() -> Self {
        let faces = [
            (Vec3::X, Vec3::NEG_Y),
            (Vec3::NEG_X, Vec3::NEG_Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::NEG_Z),
            (Vec3::Z, Vec3::NEG_Y),
            (Vec3::NEG_Z, Vec3::NEG_Y),
        ];
        Self {
            views: faces.map(|(forward, up)| Mat4::look_at_rh(Vec3::ZERO, forward, up)),
            projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0),
        }
    }
}

/// Camera transforms of the geometry subpass and skybox
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Transforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub proj_view: Mat4,
    pub eye_position: Vec4,
}

impl Transforms {
    pub fn new(view: Mat4, projection: Mat4, eye: Vec3) -> Self {
        Self { view, projection, proj_view: projection * view, eye_position: eye.extend(1.0) }
    }
}

/// One point light as the lighting subpass reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub _pad: f32,
}

impl From<PointLight> for LightData {
    fn from(light: PointLight) -> Self {
        Self { position: light.position, radius: light.radius, color: light.color, _pad: 0.0 }
    }
}

/// Everything the lighting subpass needs besides the G-buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingParams {
    pub eye_position: Vec4,
    pub lights: [LightData; NUM_LIGHTS],
}

/// Final pass selection of what to show
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DisplayInfo {
    pub display_mode: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub _pad: u32,
}

impl DisplayInfo {
    pub fn new(mode: DisplayMode, extent: (u32, u32)) -> Self {
        Self { display_mode: mode as u32, image_width: extent.0, image_height: extent.1, _pad: 0 }
    }
}

/// Per-model transforms
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerModelData {
    pub model: Mat4,
    /// Inverse transpose of `model`
    pub normal: Mat4,
}

impl PerModelData {
    pub fn new(model: Mat4) -> Self {
        Self { model, normal: model.inverse().transpose() }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Typed offset of a structure inside the blob
pub struct UniformSlot<T> {
    offset: u64,
    _marker: PhantomData<T>,
}

impl<T> Clone for UniformSlot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UniformSlot<T> {}

impl<T> std::fmt::Debug for UniformSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UniformSlot({} +{})", self.offset, std::mem::size_of::<T>())
    }
}

impl<T: Pod> UniformSlot<T> {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        std::mem::size_of::<T>() as u64
    }

    /// Descriptor pointing at this structure inside the device buffer
    pub fn descriptor(&self, buffer: BufferHandle) -> DescriptorResource {
        DescriptorResource::UniformBuffer { buffer, offset: self.offset, range: self.size() }
    }
}

pub struct UniformBlob {
    data: Vec<u8>,
    cursor: u64,
    alignment: u64,
}

impl UniformBlob {
    /// `alignment` is the device's minimum uniform buffer offset alignment
    pub fn new(capacity: u64, alignment: u64) -> Self {
        Self { data: vec![0; capacity as usize], cursor: 0, alignment: alignment.max(1) }
    }

    /// Reserve `size` bytes at the next aligned offset
    pub fn allocate(&mut self, size: u64) -> Result<u64> {
        let offset = self.cursor.div_ceil(self.alignment) * self.alignment;
        let end = offset + size;
        if end > self.data.len() as u64 {
            return Err(Error::AllocationError(format!(
                "uniform blob: {} bytes requested at offset {}, capacity {}",
                size,
                offset,
                self.data.len()
            )));
        }
        self.cursor = end;
        Ok(offset)
    }

    /// Reserve room for one `T`, zero-initialized
    pub fn allocate_for<T: Pod>(&mut self) -> Result<UniformSlot<T>> {
        let offset = self.allocate(std::mem::size_of::<T>() as u64)?;
        Ok(UniformSlot { offset, _marker: PhantomData })
    }

    pub fn write<T: Pod>(&mut self, slot: UniformSlot<T>, value: &T) {
        let start = slot.offset as usize;
        self.data[start..start + std::mem::size_of::<T>()].copy_from_slice(bytemuck::bytes_of(value));
    }

    pub fn read<T: Pod>(&self, slot: UniformSlot<T>) -> T {
        let start = slot.offset as usize;
        bytemuck::pod_read_unaligned(&self.data[start..start + std::mem::size_of::<T>()])
    }

    /// Bytes in use (up to the end of the last allocation)
    pub fn used(&self) -> u64 {
        self.cursor
    }

    pub fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.cursor as usize]
    }

    /// Copy the used prefix into `buffer` (one write per frame)
    pub fn upload(&self, device: &mut dyn GraphicsDevice, buffer: BufferHandle) -> Result<()> {
        if self.cursor == 0 {
            return Ok(());
        }
        device.write_buffer(buffer, 0, self.bytes())
    }
}

// ============================================================================
// Shared structures
// ============================================================================

/// Offsets of the structures every frame shares (per-model data is allocated per model)
#[derive(Debug, Clone, Copy)]
pub struct SharedUniforms {
    pub cube_views: UniformSlot<CubeViews>,
    pub transforms: UniformSlot<Transforms>,
    pub lighting: UniformSlot<LightingParams>,
    pub display: UniformSlot<DisplayInfo>,
}

impl SharedUniforms {
    pub fn allocate(blob: &mut UniformBlob) -> Result<Self> {
        let shared = Self {
            cube_views: blob.allocate_for()?,
            transforms: blob.allocate_for()?,
            lighting: blob.allocate_for()?,
            display: blob.allocate_for()?,
        };
        blob.write(shared.cube_views, &CubeViews::from_origin());
        Ok(shared)
    }
}

#[cfg(test)]
#[path = "uniform_blob_tests.rs"]
mod tests;
