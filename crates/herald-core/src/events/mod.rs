//! Event descriptors and the process-wide registry

pub mod builtin;
pub mod descriptor;
pub mod registry;

pub use descriptor::EventDescriptor;
pub use registry::EventRegistry;
