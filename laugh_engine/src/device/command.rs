/// Recorded GPU commands as plain data
///
/// Backends translate each `Command` into native calls when it is recorded; the
/// test device keeps them so recording order can be inspected.

use crate::device::{
    Access, BufferHandle, ClearValue, DescriptorSetHandle, FramebufferHandle, ImageHandle,
    ImageLayout, PipelineHandle, PipelineLayoutHandle, PipelineStage, RenderPassHandle,
    ShaderStage, SubresourceRange,
};

/// Viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full extent, depth range [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0.0, y: 0.0, width: width as f32, height: height as f32, min_depth: 0.0, max_depth: 1.0 }
    }
}

/// 2D rectangle (for scissor and render area)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Index type for indexed drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// Graphics or compute binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Layout transition of one image inside a command buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub range: SubresourceRange,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: Access,
    pub dst_access: Access,
}

/// A single recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass {
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        render_area: Rect2D,
        clear_values: Vec<ClearValue>,
    },
    NextSubpass,
    EndRenderPass,
    BindPipeline {
        bind_point: PipelineBindPoint,
        pipeline: PipelineHandle,
    },
    BindDescriptorSets {
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: Vec<DescriptorSetHandle>,
    },
    PushConstants {
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffer {
        buffer: BufferHandle,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    },
    SetViewport(Viewport),
    SetScissor(Rect2D),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    PipelineBarrier {
        src_stage: PipelineStage,
        dst_stage: PipelineStage,
        images: Vec<ImageBarrier>,
    },
}

impl Command {
    /// Push constants from any plain-old-data value
    pub fn push_constants<T: bytemuck::Pod>(
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        value: &T,
    ) -> Self {
        Command::PushConstants {
            layout,
            stages,
            offset: 0,
            data: bytemuck::bytes_of(value).to_vec(),
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, Command::Draw { .. } | Command::DrawIndexed { .. })
    }
}
