//! tutorguard-core: Supervised learning session engine
//!
//! This crate supervises a student's AI-tutoring session:
//!
//! - **Moderation** - [`SocraticModerator`] enforces the hint and answer-reveal policy
//! - **Suspicion scoring** - [`SuspicionAnalyzer`] scores interactions for misuse signals
//! - **Session lifecycle** - [`SessionStateMachine`] owns every status transition
//! - **Interventions** - [`InterventionCoordinator`] applies guardian actions idempotently
//! - **Analytics** - [`AnalyticsAggregator`] derives streaks, progress and achievements
//! - **Notifications** - [`NotificationDispatcher`] delivers session events to guardians
//!
//! [`SessionEngine`] ties them together over the collaborator traits
//! ([`SessionStore`], [`RoleResolver`], [`TutorBackend`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tutorguard_core::{
//!     EngineConfig, InteractionRequest, LoggingSink, MemoryStore, MockTutor,
//!     NotificationDispatcher, Role, SessionEngine, StartSession, StaticRoleResolver,
//! };
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let store = Arc::new(MemoryStore::new());
//!     let (queue, _dispatcher) =
//!         NotificationDispatcher::spawn(&config.notifications, Arc::new(LoggingSink), store.clone());
//!     let roles = StaticRoleResolver::new().with("kid", "family", Role::Student);
//!
//!     let engine = SessionEngine::new(
//!         config,
//!         store,
//!         Arc::new(roles),
//!         Arc::new(MockTutor::new()),
//!         queue,
//!     )?;
//!
//!     let snapshot = engine.start_session(StartSession::new("kid", "family")).await?;
//!     let result = engine
//!         .submit_interaction(InteractionRequest::new(
//!             snapshot.session.id.clone(),
//!             "kid",
//!             "Why do fractions need a common denominator?",
//!         ))
//!         .await?;
//!     println!("{:?}: {:?}", result.status, result.reply);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! student ──► SocraticModerator ──► TutorBackend (no lock held)
//!                   │
//!                   ▼
//!           SuspicionAnalyzer ──► SessionStateMachine ──► SessionStore
//!                                        ▲                    │
//! guardian ──► InterventionCoordinator ──┘                    ▼
//!                                              AnalyticsAggregator
//!                          NotificationQueue ──► NotificationDispatcher ──► sink
//! ```

pub mod analytics;
pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod interaction;
pub mod intervention;
pub mod moderator;
pub mod notifications;
pub mod session;
pub mod store;
pub mod tutor;
pub mod types;
pub mod validation;

// Re-export key types for convenience
pub use analytics::{
    Achievement, AchievementKind, AnalyticsAggregator, AnalyticsSnapshot, AnalyticsTarget,
    Timeframe,
};
pub use analyzer::{
    ContentHits, DeviceSignals, Severity, SignalContribution, SuspicionAnalyzer, SuspicionEvent,
    SuspicionScore,
};
pub use config::{ConfigError, EngineConfig};
pub use engine::{InteractionRequest, InteractionResult, SessionEngine};
pub use error::{EngineError, NotificationError, StoreError, TutorError, ValidationError};
pub use identity::{Role, RoleResolver, StaticRoleResolver};
pub use interaction::{AnswerOutcome, Interaction, InteractionKind, ReplySource, TutorReply};
pub use intervention::{
    InterventionAction, InterventionCoordinator, InterventionKind, InterventionRequest,
    InterventionResult, SettingsChange,
};
pub use moderator::{ModerationDecision, SocraticModerator};
pub use notifications::{
    FamilyNotification, LoggingSink, NotificationConfig, NotificationDispatcher,
    NotificationEventType, NotificationQueue, NotificationSink, RecordingSink,
};
pub use session::{LearningSession, SessionSnapshot, SessionStateMachine, SessionStatus, StartSession};
pub use store::{MemoryStore, SessionStore};
pub use tutor::{MockTutor, PedagogyConstraints, SlowMockTutor, TutorBackend};
pub use types::{
    ActionId, ActorId, EventId, FamilyId, InteractionId, MonitoringLevel, SessionId, SessionMode,
    Subject,
};
