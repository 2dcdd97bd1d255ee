/// Descriptor set layouts and descriptor writes

use crate::device::{BufferHandle, ImageLayout, ImageViewHandle, SamplerHandle, ShaderStage};

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform buffer (read-only structured data)
    UniformBuffer,
    /// Combined image sampler (texture + sampler in one binding)
    CombinedImageSampler,
    /// Same-pixel read of an attachment written by an earlier subpass
    InputAttachment,
    /// Read/write image for compute shaders
    StorageImage,
}

/// Description of a single binding slot within a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding number (corresponds to `layout(binding = N)` in GLSL)
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Shader stages that access this binding
    pub stages: ShaderStage,
}

impl DescriptorBinding {
    pub fn new(binding: u32, descriptor_type: DescriptorType, stages: ShaderStage) -> Self {
        Self { binding, descriptor_type, stages }
    }
}

/// Descriptor set layout: every binding a pipeline's shaders may declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub name: String,
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutDesc {
    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}

/// A concrete resource to write into a descriptor set binding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorResource {
    UniformBuffer { buffer: BufferHandle, offset: u64, range: u64 },
    CombinedImageSampler { view: ImageViewHandle, sampler: SamplerHandle, layout: ImageLayout },
    InputAttachment { view: ImageViewHandle, layout: ImageLayout },
    StorageImage { view: ImageViewHandle, layout: ImageLayout },
}

impl DescriptorResource {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorResource::UniformBuffer { .. } => DescriptorType::UniformBuffer,
            DescriptorResource::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
            DescriptorResource::InputAttachment { .. } => DescriptorType::InputAttachment,
            DescriptorResource::StorageImage { .. } => DescriptorType::StorageImage,
        }
    }

    /// Image view referenced by this write, if any
    pub fn image_view(&self) -> Option<ImageViewHandle> {
        match *self {
            DescriptorResource::UniformBuffer { .. } => None,
            DescriptorResource::CombinedImageSampler { view, .. }
            | DescriptorResource::InputAttachment { view, .. }
            | DescriptorResource::StorageImage { view, .. } => Some(view),
        }
    }
}

/// One binding update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

impl DescriptorWrite {
    pub fn new(binding: u32, resource: DescriptorResource) -> Self {
        Self { binding, resource }
    }
}
