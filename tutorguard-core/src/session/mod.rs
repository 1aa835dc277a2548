//! Session records, status machine, and per-session locking

pub mod locks;
pub mod machine;
pub mod record;
pub mod state;

// Re-export key types for convenience
pub use locks::{SessionGuard, SessionLocks};
pub use machine::{InteractionDraft, InteractionOutcome, SessionStateMachine};
pub use record::{LearningSession, SessionSnapshot, StartSession};
pub use state::{SessionStatus, Transition, Trigger};
