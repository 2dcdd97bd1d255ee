//! Scene module
//!
//! The skybox and the models of the geometry subpass, each model with its
//! own buffers, maps, uniform block and descriptor set.

mod gpu_mesh;
mod model;
mod scene;
mod skybox;

pub use gpu_mesh::GpuMesh;
pub use model::{Model, ModelDesc, ModelTextures, DEFAULT_MATERIAL_ID};
pub use scene::{Scene, SceneDesc};
pub use skybox::Skybox;
