pub mod audio;
pub mod config;
pub mod core;

// Re-export commonly used items for convenience
pub use config::LiveSettings;
pub use core::*;
