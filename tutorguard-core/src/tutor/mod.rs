//! AI tutor collaborator
//!
//! The engine only knows the [`TutorBackend`] contract; the model behind it is
//! someone else's concern.

pub mod mock;
pub mod slow_mock;
pub mod traits;

pub use mock::MockTutor;
pub use slow_mock::SlowMockTutor;
pub use traits::{PedagogyConstraints, TutorBackend};
