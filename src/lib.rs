//! Strata – a hierarchical action-resolution and transition-scheduling runtime
//!
//! This crate binds declaratively described action descriptors to behaviors
//! and runs them against hierarchies of frames, with:
//! - Late binding of behaviors by name through an explicitly owned registry
//! - Relative store addressing that keeps spawned clones on their own data
//! - Guarded, all-or-nothing transitions between frames
//! - Suspension of a host frame while an auxiliary framer runs to completion
//! - Run-time spawning and destruction of auxiliary clones

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime core: descriptors, resolution, the store and framer mechanics
pub mod runtime;

/// Built-in behaviors
pub mod behaviors;

// Re-export key types for convenience
pub use runtime::{Runtime, RuntimeConfig, install_tracing};

/// Current version of the strata runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
