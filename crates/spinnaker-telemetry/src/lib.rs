//! This crate contains the tracing subscriber setup shared by the Spinnaker provider binaries.
pub mod tracing;

pub use tracing::Tracing;
