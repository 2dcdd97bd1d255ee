/// Asset collaborators: meshes, textures, SPIR-V and persisted maps
///
/// The renderer never touches the file system directly. Everything it reads or
/// writes goes through an `AssetLoader`, so tests can run against memory.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::assets::dds;
use crate::device::{Format, ImageData, VertexAttribute, VertexLayout};
use crate::error::{Error, Result};
use crate::engine_debug;

// ============================================================================
// Mesh data
// ============================================================================

/// Interleaved mesh vertex (position, normal, tangent, uv)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Vertex input layout matching the struct
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Vertex>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, format: Format::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, format: Format::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, format: Format::R32G32B32_SFLOAT, offset: 24 },
                VertexAttribute { location: 3, format: Format::R32G32_SFLOAT, offset: 36 },
            ],
        }
    }
}

/// Decoded mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centered at the origin, faces wound to be seen from inside
    pub fn unit_cube() -> Self {
        let corners = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        let vertices = corners
            .iter()
            .map(|p: &[f32; 3]| {
                let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
                Vertex {
                    position: *p,
                    normal: [-p[0] / len, -p[1] / len, -p[2] / len],
                    ..Default::default()
                }
            })
            .collect();
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
        ];
        Self { vertices, indices }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

// ============================================================================
// Loader trait
// ============================================================================

/// Source of every asset the renderer consumes or persists
pub trait AssetLoader {
    /// Whether an optional asset is present
    fn exists(&self, path: &Path) -> bool;

    fn load_mesh(&self, path: &Path) -> Result<MeshData>;

    /// Texture with its full mip chain (2D or cube)
    fn load_texture(&self, path: &Path) -> Result<ImageData>;

    /// Compiled SPIR-V words
    fn load_spirv(&self, path: &Path) -> Result<Vec<u32>>;

    /// Persist a texture so later runs can load it instead of recomputing it
    fn save_texture(&self, path: &Path, image: &ImageData) -> Result<()>;
}

/// Turns mesh file bytes into vertices (OBJ, glTF, ... live outside the engine)
pub trait MeshDecoder {
    fn decode(&self, path: &Path, bytes: &[u8]) -> Result<MeshData>;
}

fn spirv_words(path: &Path, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::AssetError(format!(
            "{}: SPIR-V size {} is not a multiple of 4",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

fn with_path(path: &Path, error: Error) -> Error {
    match error {
        Error::AssetError(msg) => Error::AssetError(format!("{}: {}", path.display(), msg)),
        other => other,
    }
}

// ============================================================================
// File system loader
// ============================================================================

/// Reads assets from disk; textures are DDS files
pub struct FsAssetLoader {
    mesh_decoder: Option<Box<dyn MeshDecoder>>,
}

impl FsAssetLoader {
    pub fn new() -> Self {
        Self { mesh_decoder: None }
    }

    pub fn with_mesh_decoder(mut self, decoder: Box<dyn MeshDecoder>) -> Self {
        self.mesh_decoder = Some(decoder);
        self
    }

    fn read(path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| Error::AssetError(format!("{}: {}", path.display(), e)))
    }
}

impl Default for FsAssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader for FsAssetLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load_mesh(&self, path: &Path) -> Result<MeshData> {
        let decoder = self
            .mesh_decoder
            .as_ref()
            .ok_or_else(|| Error::AssetError(format!("{}: no mesh decoder installed", path.display())))?;
        decoder.decode(path, &Self::read(path)?)
    }

    fn load_texture(&self, path: &Path) -> Result<ImageData> {
        dds::decode(&Self::read(path)?).map_err(|e| with_path(path, e))
    }

    fn load_spirv(&self, path: &Path) -> Result<Vec<u32>> {
        spirv_words(path, &Self::read(path)?)
    }

    fn save_texture(&self, path: &Path, image: &ImageData) -> Result<()> {
        let bytes = dds::encode(image).map_err(|e| with_path(path, e))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bytes).map_err(|e| Error::AssetError(format!("{}: {}", path.display(), e)))?;
        engine_debug!("laugh::Assets", "Saved {}", path.display());
        Ok(())
    }
}

// ============================================================================
// In-memory loader
// ============================================================================

/// Memory-backed loader; clones share the same file table
///
/// Textures are stored DDS-encoded so saving and reloading runs through the
/// same codec as the file system loader.
#[derive(Clone, Default)]
pub struct MemoryAssetLoader {
    files: Rc<RefCell<FxHashMap<PathBuf, Vec<u8>>>>,
    meshes: Rc<RefCell<FxHashMap<PathBuf, MeshData>>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(path.into(), bytes);
    }

    pub fn insert_texture(&self, path: impl Into<PathBuf>, image: &ImageData) -> Result<()> {
        self.insert_file(path, dds::encode(image)?);
        Ok(())
    }

    pub fn insert_mesh(&self, path: impl Into<PathBuf>, mesh: MeshData) {
        self.meshes.borrow_mut().insert(path.into(), mesh);
    }

    /// Register SPIR-V for a shader (the words only need to be non-empty)
    pub fn insert_spirv(&self, path: impl Into<PathBuf>, words: &[u32]) {
        self.insert_file(path, bytemuck::cast_slice(words).to_vec());
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.borrow_mut().remove(path).is_some()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.file(path)
            .ok_or_else(|| Error::AssetError(format!("{}: not found", path.display())))
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path) || self.meshes.borrow().contains_key(path)
    }

    fn load_mesh(&self, path: &Path) -> Result<MeshData> {
        self.meshes
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::AssetError(format!("{}: not found", path.display())))
    }

    fn load_texture(&self, path: &Path) -> Result<ImageData> {
        dds::decode(&self.read(path)?).map_err(|e| with_path(path, e))
    }

    fn load_spirv(&self, path: &Path) -> Result<Vec<u32>> {
        spirv_words(path, &self.read(path)?)
    }

    fn save_texture(&self, path: &Path, image: &ImageData) -> Result<()> {
        let bytes = dds::encode(image).map_err(|e| with_path(path, e))?;
        self.insert_file(path, bytes);
        Ok(())
    }
}

#[cfg(test)]
#[path = "asset_loader_tests.rs"]
mod tests;
