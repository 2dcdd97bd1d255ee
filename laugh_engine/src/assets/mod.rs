/// Asset collaborators and the DDS container used for persisted maps

pub mod dds;
pub mod asset_loader;
pub mod precomputed;

pub use asset_loader::*;
pub use precomputed::*;
