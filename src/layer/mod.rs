//! Deterministic layer archives
//!
//! A layer is an ordered list of file entries serialized to one gzip
//! compressed tar blob. Identical input always yields identical bytes: the
//! dependency cache is keyed on the descriptor checksum alone, so a layer
//! that drifted between builds would silently diverge under one cache tag.

pub mod builder;

pub use builder::{build_layer, LayerEntry, DEFAULT_MODE, EXECUTABLE_MODE};
