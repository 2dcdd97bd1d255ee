/// Deferred renderer orchestration and its lifecycle contract

pub mod lifecycle;
pub mod deferred_renderer;

pub use lifecycle::*;
pub use deferred_renderer::*;
