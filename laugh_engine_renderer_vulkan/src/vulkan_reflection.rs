/// SPIR-V reflection with spirq: the bindings and push constant block a shader declares

use laugh_engine::laugh::Result;
use laugh_engine::laugh::device::{DescriptorType, ReflectedBinding, ShaderInterface};
use laugh_engine::engine_bail;

/// Reflect every entry point of a SPIR-V module into one interface
///
/// Bindings are deduplicated by (set, binding); the push constant size is the
/// largest block found.
pub(crate) fn reflect_shader(name: &str, code: &[u32]) -> Result<ShaderInterface> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| laugh_engine::engine_err!("laugh::vulkan", "SPIR-V reflection of '{}' failed: {:?}", name, e))?;

    let mut interface = ShaderInterface::default();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { desc_bind, desc_ty, .. } => {
                    let binding = ReflectedBinding {
                        set: desc_bind.set(),
                        binding: desc_bind.bind(),
                        descriptor_type: descriptor_type(name, desc_ty)?,
                    };
                    if !interface.bindings.contains(&binding) {
                        interface.bindings.push(binding);
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    let size = ty.nbyte().unwrap_or(0) as u32;
                    interface.push_constant_size = interface.push_constant_size.max(size);
                }
                _ => {}
            }
        }
    }

    interface.bindings.sort_by_key(|b| (b.set, b.binding));
    Ok(interface)
}

fn descriptor_type(name: &str, desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spirq;
    match desc_ty {
        Spirq::UniformBuffer() => Ok(DescriptorType::UniformBuffer),
        Spirq::CombinedImageSampler() => Ok(DescriptorType::CombinedImageSampler),
        Spirq::InputAttachment(..) => Ok(DescriptorType::InputAttachment),
        Spirq::StorageImage(..) => Ok(DescriptorType::StorageImage),
        other => {
            engine_bail!("laugh::vulkan", "Shader '{}' uses unsupported descriptor type {:?}", name, other);
        }
    }
}
