/// Build-time check of reflected shader interfaces against pipeline layouts

use crate::device::{DescriptorSetLayoutDesc, PushConstantRange, ShaderInterface, ShaderStage};
use crate::engine_debug;
use crate::error::{Error, Result};

/// Check that everything `interface` declares exists in the layout
///
/// - every reflected binding exists in the set layout at the same set index,
///   with the same descriptor type, visible to `stage`
/// - a push constant block fits in a range visible to `stage`
pub fn validate_shader_interface(
    pipeline: &str,
    stage: ShaderStage,
    interface: &ShaderInterface,
    set_layouts: &[&DescriptorSetLayoutDesc],
    push_constant_ranges: &[PushConstantRange],
) -> Result<()> {
    let mismatch = |detail: String| Error::ShaderStageMismatch {
        pipeline: pipeline.to_string(),
        stage: stage.name().to_string(),
        detail,
    };

    for reflected in &interface.bindings {
        let layout = set_layouts
            .get(reflected.set as usize)
            .ok_or_else(|| mismatch(format!("set {} is not part of the pipeline layout", reflected.set)))?;

        let declared = layout.binding(reflected.binding).ok_or_else(|| {
            mismatch(format!(
                "set {} binding {} is not in layout '{}'",
                reflected.set, reflected.binding, layout.name
            ))
        })?;

        if declared.descriptor_type != reflected.descriptor_type {
            return Err(mismatch(format!(
                "set {} binding {} is {:?} in the shader but {:?} in layout '{}'",
                reflected.set, reflected.binding, reflected.descriptor_type, declared.descriptor_type, layout.name
            )));
        }

        if !declared.stages.contains(stage) {
            return Err(mismatch(format!(
                "set {} binding {} is not visible to this stage in layout '{}'",
                reflected.set, reflected.binding, layout.name
            )));
        }
    }

    if interface.push_constant_size > 0 {
        let covered = push_constant_ranges
            .iter()
            .any(|r| r.stages.contains(stage) && r.offset + r.size >= interface.push_constant_size);
        if !covered {
            return Err(mismatch(format!(
                "push constant block of {} bytes has no matching range",
                interface.push_constant_size
            )));
        }
    }

    Ok(())
}

/// Layout bindings that none of `interfaces` declares, as `(set, binding)`
pub fn unused_layout_bindings(
    set_layouts: &[&DescriptorSetLayoutDesc],
    interfaces: &[&ShaderInterface],
) -> Vec<(u32, u32)> {
    let mut unused = Vec::new();
    for (set, layout) in set_layouts.iter().enumerate() {
        let set = set as u32;
        for declared in &layout.bindings {
            let used = interfaces
                .iter()
                .flat_map(|i| i.bindings.iter())
                .any(|r| r.set == set && r.binding == declared.binding);
            if !used {
                unused.push((set, declared.binding));
            }
        }
    }
    unused
}

/// Debug-log every layout binding no stage of `pipeline` reads
pub fn report_unused_layout_bindings(
    pipeline: &str,
    set_layouts: &[&DescriptorSetLayoutDesc],
    interfaces: &[&ShaderInterface],
) {
    for (set, binding) in unused_layout_bindings(set_layouts, interfaces) {
        let layout = set_layouts.get(set as usize).map_or("", |l| l.name.as_str());
        engine_debug!(
            "laugh::Pipelines",
            "{}: set {} binding {} of layout '{}' is not declared by any stage",
            pipeline,
            set,
            binding,
            layout
        );
    }
}

#[cfg(test)]
#[path = "shader_validation_tests.rs"]
mod tests;
