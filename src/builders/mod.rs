//! # Builders
//!
//! Fluent configuration for creating and opening packages.
//!
//! ## Modules
//!
//! - [`container_builder`] - Create API with optional caller-supplied randomness
//! - [`options`] - Per-handle runtime options (chunk size, staging dir, MAC check, cancellation)

pub mod container_builder;
pub mod options;

pub use container_builder::ContainerBuilder;
pub use options::ContainerOptions;
