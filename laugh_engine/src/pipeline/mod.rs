/// Pipeline & descriptor builder: set layouts, shader validation, pipelines and descriptor sets

pub mod push_constants;
pub mod descriptor_layouts;
pub mod shader_validation;
pub mod shader_library;
pub mod pipeline_builder;
pub mod descriptor_sets;

pub use push_constants::*;
pub use descriptor_layouts::{bindings, set_layout_desc, SetLayoutKind};
pub use shader_validation::{report_unused_layout_bindings, unused_layout_bindings, validate_shader_interface};
pub use shader_library::{stage_from_name, ShaderLibrary};
pub use pipeline_builder::{PipelineKind, Pipelines};
pub use descriptor_sets::{DescriptorSets, SetRole, SetSources};
