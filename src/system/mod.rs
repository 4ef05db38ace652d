//! System utilities for embedded devices.
//!
//! # Available Utilities
//!
//! - **[`diagnostics`]**: best-effort text trace of modem commands, raw
//!   responses and decoded messages

/// Human-readable protocol trace sinks and formatting adapters.
pub mod diagnostics;
