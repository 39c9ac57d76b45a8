// SPDX-License-Identifier: MIT

//! Long-term memory - per-user preferences
//!
//! Read once per request by the planner; written once when a session is
//! created for a user with no stored preferences.

use crate::adk::error::PostgenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stored preferences for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub preferred_tone: Option<String>,
    /// Platform name -> free-form platform settings
    #[serde(default)]
    pub platform_defaults: HashMap<String, Value>,
}

impl UserPreferences {
    /// Defaults written for a user seen for the first time
    pub fn defaults_for(user_id: &str, platform: &str) -> Self {
        let mut platform_defaults = HashMap::new();
        platform_defaults.insert(platform.to_string(), Value::Object(Default::default()));
        Self {
            user_id: user_id.to_string(),
            preferred_tone: Some("professional".to_string()),
            platform_defaults,
        }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_preferences(&self, user_id: &str)
        -> Result<Option<UserPreferences>, PostgenError>;

    async fn upsert_preferences(
        &self,
        user_id: &str,
        preferences: UserPreferences,
    ) -> Result<(), PostgenError>;
}

/// Process-local memory store
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, UserPreferences>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPreferences>, PostgenError> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }

    async fn upsert_preferences(
        &self,
        user_id: &str,
        preferences: UserPreferences,
    ) -> Result<(), PostgenError> {
        let mut users = self.users.write().await;
        users.insert(user_id.to_string(), preferences);
        Ok(())
    }
}
