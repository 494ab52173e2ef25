//! Bridge assembly.
//!
//! This module wires the runtime, transports, registry and delivery thread
//! together.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Host-facing entry point |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Runtime and transport settings |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for bridge configuration.
pub mod builder;

/// Core bridge implementation.
pub mod core;

/// Runtime and transport settings.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use core::Bridge;
pub use options::BridgeOptions;
