//! Service Kit - Kernel Tools
//!
//! Domain tools that implement `kernel_core::TypedTool`.

mod scan;

pub use scan::{ScanParams, ScanTool};
