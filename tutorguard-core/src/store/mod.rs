//! Persistence collaborator
//!
//! The engine stores records by id only and never deletes a session.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{SessionCommit, SessionRecords, SessionStore};
