//! Camera module: the perspective camera driving the per-frame transforms.

mod camera;

pub use camera::Camera;
