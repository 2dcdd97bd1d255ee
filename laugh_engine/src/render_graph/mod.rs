/// Render pass graph builder: pass tables, device passes and framebuffers

pub mod pass_builder;
pub mod framebuffers;

pub use pass_builder::*;
pub use framebuffers::*;
