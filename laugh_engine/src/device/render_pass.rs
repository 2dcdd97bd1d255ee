/// Render pass, subpass dependency and framebuffer descriptors
///
/// A render pass is described as plain data: attachments, subpasses referencing
/// attachments by index, and the dependencies that order subpasses against each
/// other and against work outside the pass. `RenderPassDesc::validate` checks the
/// structural rules before anything reaches the device.

use bitflags::bitflags;
use crate::device::{Format, ImageLayout, ImageViewHandle, RenderPassHandle};
use crate::error::{Error, Result};

/// Subpass index meaning "work outside this render pass"
pub const SUBPASS_EXTERNAL: u32 = u32::MAX;

bitflags! {
    /// Pipeline stages for dependencies, barriers and semaphore waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const GEOMETRY_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const COMPUTE_SHADER = 1 << 7;
        const TRANSFER = 1 << 8;
        const BOTTOM_OF_PIPE = 1 << 9;
    }
}

bitflags! {
    /// Memory access kinds for dependencies and barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        const INPUT_ATTACHMENT_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
        const SHADER_WRITE = 1 << 2;
        const COLOR_ATTACHMENT_READ = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 5;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 6;
        const TRANSFER_READ = 1 << 7;
        const TRANSFER_WRITE = 1 << 8;
        const MEMORY_READ = 1 << 9;
    }
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDesc {
    pub format: Format,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Layout the attachment is in when the pass begins
    pub initial_layout: ImageLayout,
    /// Layout the pass leaves the attachment in
    pub final_layout: ImageLayout,
}

/// Reference from a subpass to an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment: u32,
    pub layout: ImageLayout,
}

impl AttachmentRef {
    pub fn new(attachment: u32, layout: ImageLayout) -> Self {
        Self { attachment, layout }
    }
}

/// One subpass: what it writes and what it reads at the same pixel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubpassDesc {
    pub color_attachments: Vec<AttachmentRef>,
    pub depth_attachment: Option<AttachmentRef>,
    pub input_attachments: Vec<AttachmentRef>,
}

impl SubpassDesc {
    /// Whether this subpass writes `attachment` (as color or depth)
    fn writes(&self, attachment: u32) -> Option<Access> {
        if self.color_attachments.iter().any(|r| r.attachment == attachment) {
            return Some(Access::COLOR_ATTACHMENT_WRITE);
        }
        match self.depth_attachment {
            Some(r) if r.attachment == attachment => Some(Access::DEPTH_STENCIL_ATTACHMENT_WRITE),
            _ => None,
        }
    }
}

/// Execution and memory dependency between two subpasses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    pub src_access: Access,
    pub dst_access: Access,
    /// Framebuffer-local (per pixel) dependency
    pub by_region: bool,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    /// Debug name, used in logs and errors
    pub name: String,
    pub attachments: Vec<AttachmentDesc>,
    pub subpasses: Vec<SubpassDesc>,
    pub dependencies: Vec<SubpassDependency>,
}

impl RenderPassDesc {
    /// Check the structural rules of the pass
    ///
    /// - every attachment reference points into `attachments`
    /// - depth references use depth formats, color references do not
    /// - every dependency names existing subpasses and only points forward
    /// - every input attachment read is produced by an earlier subpass and covered
    ///   by a dependency carrying that write into `INPUT_ATTACHMENT_READ`
    ///   (or the attachment is loaded from before the pass)
    pub fn validate(&self) -> Result<()> {
        if self.subpasses.is_empty() {
            return Err(self.invalid("no subpasses".to_string()));
        }

        let attachment_count = self.attachments.len() as u32;
        for (index, subpass) in self.subpasses.iter().enumerate() {
            for r in subpass.color_attachments.iter().chain(subpass.input_attachments.iter()) {
                if r.attachment >= attachment_count {
                    return Err(self.invalid(format!(
                        "subpass {} references attachment {} but only {} exist",
                        index, r.attachment, attachment_count
                    )));
                }
                if r.layout == ImageLayout::Undefined {
                    return Err(self.invalid(format!(
                        "subpass {} references attachment {} with an undefined layout",
                        index, r.attachment
                    )));
                }
            }
            for r in &subpass.color_attachments {
                if self.attachments[r.attachment as usize].format.is_depth() {
                    return Err(self.invalid(format!(
                        "subpass {} uses depth attachment {} as a color target",
                        index, r.attachment
                    )));
                }
            }
            if let Some(r) = subpass.depth_attachment {
                if r.attachment >= attachment_count {
                    return Err(self.invalid(format!(
                        "subpass {} references depth attachment {} but only {} exist",
                        index, r.attachment, attachment_count
                    )));
                }
                if !self.attachments[r.attachment as usize].format.is_depth() {
                    return Err(self.invalid(format!(
                        "subpass {} uses color attachment {} as depth target",
                        index, r.attachment
                    )));
                }
            }
        }

        let subpass_count = self.subpasses.len() as u32;
        for (index, dep) in self.dependencies.iter().enumerate() {
            let valid = |s: u32| s == SUBPASS_EXTERNAL || s < subpass_count;
            if !valid(dep.src_subpass) || !valid(dep.dst_subpass) {
                return Err(self.invalid(format!("dependency {} names a missing subpass", index)));
            }
            if dep.src_subpass == SUBPASS_EXTERNAL && dep.dst_subpass == SUBPASS_EXTERNAL {
                return Err(self.invalid(format!("dependency {} is external on both ends", index)));
            }
            if dep.src_subpass != SUBPASS_EXTERNAL
                && dep.dst_subpass != SUBPASS_EXTERNAL
                && dep.src_subpass > dep.dst_subpass
            {
                return Err(self.invalid(format!(
                    "dependency {} points backwards ({} -> {})",
                    index, dep.src_subpass, dep.dst_subpass
                )));
            }
        }

        for (reader, subpass) in self.subpasses.iter().enumerate() {
            for input in &subpass.input_attachments {
                self.check_input_read(reader as u32, input.attachment)?;
            }
        }

        Ok(())
    }

    fn check_input_read(&self, reader: u32, attachment: u32) -> Result<()> {
        let writer = (0..reader)
            .rev()
            .find_map(|s| self.subpasses[s as usize].writes(attachment).map(|access| (s, access)));

        let Some((writer, write_access)) = writer else {
            if self.attachments[attachment as usize].load_op == LoadOp::Load {
                return Ok(());
            }
            return Err(self.invalid(format!(
                "subpass {} reads input attachment {} that no earlier subpass writes",
                reader, attachment
            )));
        };

        let write_stage = if write_access == Access::COLOR_ATTACHMENT_WRITE {
            PipelineStage::COLOR_ATTACHMENT_OUTPUT
        } else {
            PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS
        };

        let covered = self.dependencies.iter().any(|dep| {
            dep.src_subpass == writer
                && dep.dst_subpass == reader
                && dep.src_access.contains(write_access)
                && dep.src_stage.intersects(write_stage)
                && dep.dst_access.contains(Access::INPUT_ATTACHMENT_READ)
                && dep.dst_stage.contains(PipelineStage::FRAGMENT_SHADER)
        });

        if covered {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "input attachment {} read by subpass {} is not covered by a dependency from writer subpass {}",
                attachment, reader, writer
            )))
        }
    }

    fn invalid(&self, detail: String) -> Error {
        Error::InvalidRenderPass(format!("{}: {}", self.name, detail))
    }
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Descriptor for creating a framebuffer
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub render_pass: RenderPassHandle,
    /// One view per render pass attachment, same order
    pub attachments: Vec<ImageViewHandle>,
    pub width: u32,
    pub height: u32,
    /// 6 for layered cube rendering
    pub layers: u32,
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
