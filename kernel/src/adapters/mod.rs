// Concrete store implementations.

pub mod memory;
