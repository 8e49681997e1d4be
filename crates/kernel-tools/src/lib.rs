//! # kernel-tools
//!
//! Concrete tools registered with the task kernel.
//!
//! Tools receive their collaborators (provider registry, key/value store) at
//! construction and never reach for globals.
//!
//! ```text
//! TOOL:scan|{"target":"example.com","ai_provider":"gemini"}
//!        │
//!        ▼
//! ┌───────────┐  save scan_target_<id>  ┌───────────────┐
//! │ ScanTool  │────────────────────────▶│ KeyValueStore │
//! └─────┬─────┘                         └───────────────┘
//!       │ "Analyze this scan target: …"
//!       ▼
//! ┌──────────────────┐
//! │ ProviderRegistry │  (falls back to the default provider)
//! └──────────────────┘
//! ```

use std::sync::Arc;

use kernel_core::{EchoTool, Kernel, Result, Typed};

pub mod svckit;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::ScanTool;
    pub use kernel_core::EchoTool;
}

/// Register the built-in tool set with a kernel, wiring in its collaborators
pub fn register_defaults(kernel: &Kernel) -> Result<()> {
    kernel.register_tool(Typed(EchoTool))?;
    kernel.register_tool(Typed(svckit::ScanTool::new(
        Some(Arc::clone(kernel.providers())),
        kernel.store().cloned(),
    )))?;
    Ok(())
}
