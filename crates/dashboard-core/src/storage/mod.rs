//! Token storage implementations.

pub mod memory;

#[cfg(feature = "file-storage")]
pub mod file;

pub use memory::MemoryTokenStorage;

#[cfg(feature = "file-storage")]
pub use file::FileTokenStorage;
