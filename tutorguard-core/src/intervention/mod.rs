//! Guardian interventions
//!
//! Guardians act on a session through the [`InterventionCoordinator`], which
//! checks approval rules, applies the transition and builds the audit record.

pub mod coordinator;
pub mod types;

pub use coordinator::{AppliedIntervention, InterventionCoordinator};
pub use types::{
    InterventionAction, InterventionKind, InterventionRequest, InterventionResult, SettingsChange,
};
