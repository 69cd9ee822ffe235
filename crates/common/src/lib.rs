//! Shared value types used across the workspace.

pub mod serde_duration;
pub mod types;

pub use types::EntityId;
