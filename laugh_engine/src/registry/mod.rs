pub mod resource_registry;

pub use resource_registry::*;
