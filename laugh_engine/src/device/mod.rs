/// Device layer contract: handles, descriptors, commands and the GraphicsDevice trait

pub mod handles;
pub mod format;
pub mod image;
pub mod buffer;
pub mod render_pass;
pub mod descriptor;
pub mod pipeline;
pub mod command;
pub mod queue;
pub mod graphics_device;

#[cfg(test)]
pub mod mock_device;

pub use handles::*;
pub use format::*;
pub use image::*;
pub use buffer::*;
pub use render_pass::*;
pub use descriptor::*;
pub use pipeline::*;
pub use command::*;
pub use queue::*;
pub use graphics_device::*;
