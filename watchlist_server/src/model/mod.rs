//! Domain state of the engine.
//!
//! - `store` — quote rows with the "current" marker, snapshot reads and atomic commits.
//! - `reconciler` — pure planning and write computation for each `MutationRequest`.
//! - `persist` — JSON file helpers shared by the store and the scheduler registry.

pub mod persist;
pub mod reconciler;
pub mod store;
