/// Shader modules, pipeline layouts and pipeline state descriptors

use bitflags::bitflags;
use crate::device::{
    DescriptorSetLayoutHandle, DescriptorType, Format, PipelineLayoutHandle, RenderPassHandle,
    ShaderModuleHandle,
};

bitflags! {
    /// Shader stage visibility flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;
        const COMPUTE = 1 << 3;
    }
}

impl ShaderStage {
    /// Readable name of a single stage
    pub fn name(&self) -> &'static str {
        if *self == ShaderStage::VERTEX {
            "vertex"
        } else if *self == ShaderStage::GEOMETRY {
            "geometry"
        } else if *self == ShaderStage::FRAGMENT {
            "fragment"
        } else if *self == ShaderStage::COMPUTE {
            "compute"
        } else {
            "mixed"
        }
    }
}

// ===== SHADERS =====

/// Descriptor for creating a shader module
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderModuleDesc {
    /// Name the shader was loaded under (e.g. "lighting.frag")
    pub name: String,
    pub stage: ShaderStage,
    /// SPIR-V words
    pub code: Vec<u32>,
}

/// A binding declared by a shader, as found by reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: DescriptorType,
}

/// Resource interface declared by one shader module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    pub bindings: Vec<ReflectedBinding>,
    /// Size of the push constant block in bytes (0 when absent)
    pub push_constant_size: u32,
}

// ===== LAYOUT =====

/// Push constant range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStage,
    pub offset: u32,
    pub size: u32,
}

/// Descriptor for creating a pipeline layout
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineLayoutDesc {
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

// ===== VERTEX INPUT =====

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader location
    pub location: u32,
    pub format: Format,
    /// Offset within the vertex in bytes
    pub offset: u32,
}

/// Interleaved vertex layout of a single vertex buffer binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

// ===== FIXED FUNCTION STATE =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    Always,
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl DepthState {
    /// No depth test, no depth write (full-screen passes)
    pub const DISABLED: Self = Self { test_enable: false, write_enable: false, compare_op: CompareOp::Always };
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Color blending state of one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

impl ColorBlendAttachment {
    /// Overwrite
    pub const OPAQUE: Self = Self { blend_enable: false, src_factor: BlendFactor::One, dst_factor: BlendFactor::Zero };
    /// `dst = src + dst`
    pub const ADDITIVE: Self = Self { blend_enable: true, src_factor: BlendFactor::One, dst_factor: BlendFactor::One };
}

/// Specialization constant bound to one shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecializationConstant {
    pub constant_id: u32,
    pub value: u32,
}

/// One shader stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineShaderStage {
    pub module: ShaderModuleHandle,
    pub stage: ShaderStage,
    pub specialization: Vec<SpecializationConstant>,
}

/// Descriptor for creating a graphics pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub name: String,
    pub stages: Vec<PipelineShaderStage>,
    /// None for full-screen triangle passes (no vertex buffer)
    pub vertex_layout: Option<VertexLayout>,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth: DepthState,
    /// One entry per color attachment of the subpass
    pub color_blend: Vec<ColorBlendAttachment>,
    /// Viewport and scissor are set by commands instead of baked in
    pub dynamic_viewport: bool,
    /// Baked viewport extent when `dynamic_viewport` is false
    pub extent: (u32, u32),
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub subpass: u32,
}

/// Descriptor for creating a compute pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub module: ShaderModuleHandle,
    pub layout: PipelineLayoutHandle,
}
