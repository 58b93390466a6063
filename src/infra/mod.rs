//! Infrastructure adapters for backlog storage.

pub mod queue;
pub use queue::InMemoryBacklog;
