//! Service layer components.
//!
//! Holds the read-only model registry shared by every request.

pub mod model_registry;

// Re-export commonly used types
pub use model_registry::{ModelDescriptor, ModelRegistry};
