//! Concrete [`taskengine_kernel::Store`] implementations.

mod memory;

pub use memory::MemoryStore;
