//! Lamina - layered container image builder
//!
//! Builds an image from a base image and an application directory. A builder
//! strategy chosen from marker files produces an optional dependency layer,
//! cached in the registry under a key derived from the base image and the
//! dependency descriptor, and an application layer on top.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod deadline;
pub mod error;
pub mod image;
pub mod layer;
pub mod orchestration;
pub mod registry;
pub mod resolver;
pub mod ui;

pub use error::{LaminaError, LaminaResult};
