//! Backlog backends.

pub mod memory;

pub use memory::InMemoryBacklog;
