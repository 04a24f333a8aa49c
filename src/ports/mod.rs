//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the engine and its collaborators (artifact store, model runtime).

mod blob_store;
mod predictor;

pub use blob_store::BlobStore;
pub use predictor::Predictor;
