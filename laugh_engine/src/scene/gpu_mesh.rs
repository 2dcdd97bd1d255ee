/// Vertex and index buffers of one mesh, living in the registry's buffer arena

use crate::assets::MeshData;
use crate::device::*;
use crate::error::{Error, Result};
use crate::registry::{BufferId, ResourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        name: &str,
        mesh: &MeshData,
    ) -> Result<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(Error::InvalidResource(format!("mesh {} has no triangles", name)));
        }
        let vertex_bytes = mesh.vertex_bytes();
        let index_bytes = mesh.index_bytes();

        let vertex_buffer = registry.create_buffer(
            device,
            &format!("{}_vertices", name),
            BufferDesc { size: vertex_bytes.len() as u64, usage: BufferUsage::VERTEX, location: MemoryLocation::CpuToGpu },
        )?;
        registry.write_buffer(device, vertex_buffer, 0, vertex_bytes)?;

        let index_buffer = registry.create_buffer(
            device,
            &format!("{}_indices", name),
            BufferDesc { size: index_bytes.len() as u64, usage: BufferUsage::INDEX, location: MemoryLocation::CpuToGpu },
        )?;
        registry.write_buffer(device, index_buffer, 0, index_bytes)?;

        Ok(Self { vertex_buffer, index_buffer, index_count: mesh.indices.len() as u32 })
    }

    /// Bind both buffers and issue one indexed draw
    pub fn draw_commands(&self, registry: &ResourceRegistry) -> Result<Vec<Command>> {
        Ok(vec![
            Command::BindVertexBuffer { buffer: registry.buffer(self.vertex_buffer)?.buffer, offset: 0 },
            Command::BindIndexBuffer {
                buffer: registry.buffer(self.index_buffer)?.buffer,
                offset: 0,
                index_type: IndexType::U32,
            },
            Command::DrawIndexed { index_count: self.index_count, instance_count: 1 },
        ])
    }
}
