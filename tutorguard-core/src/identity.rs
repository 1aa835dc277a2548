//! Role resolution
//!
//! Authentication happens elsewhere; the engine only consumes the resolved
//! role of an actor within a family.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{ActorId, FamilyId};

/// Role of an actor within one family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Guardian,
    /// Not a member of the family
    None,
}

/// Identity and role service
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn role_of(&self, actor: &ActorId, family: &FamilyId) -> Result<Role, StoreError>;
}

/// In-memory role table for tests and offline runs
#[derive(Default)]
pub struct StaticRoleResolver {
    roles: RwLock<HashMap<(ActorId, FamilyId), Role>>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, actor: impl Into<ActorId>, family: impl Into<FamilyId>, role: Role) {
        self.roles
            .write()
            .await
            .insert((actor.into(), family.into()), role);
    }

    /// Builder-style variant of `assign` for synchronous setup
    #[must_use]
    pub fn with(mut self, actor: impl Into<ActorId>, family: impl Into<FamilyId>, role: Role) -> Self {
        self.roles
            .get_mut()
            .insert((actor.into(), family.into()), role);
        self
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn role_of(&self, actor: &ActorId, family: &FamilyId) -> Result<Role, StoreError> {
        Ok(self
            .roles
            .read()
            .await
            .get(&(actor.clone(), family.clone()))
            .copied()
            .unwrap_or(Role::None))
    }
}
