//! CLI command implementations

pub mod batch;
pub mod build;
pub mod config;
pub mod inspect;

pub use batch::execute as batch;
pub use build::execute as build;
pub use config::execute as config;
pub use inspect::execute as inspect;
