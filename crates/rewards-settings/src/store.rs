use crate::types::{SystemSettings, UserPreferences};
use async_trait::async_trait;
use rewards_types::{Result, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_system(&self) -> Result<Option<SystemSettings>>;
    async fn put_system(&self, settings: SystemSettings) -> Result<()>;
    async fn get_prefs(&self, user: UserId) -> Result<Option<UserPreferences>>;
    async fn put_prefs(&self, user: UserId, prefs: UserPreferences) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySettingsStore {
    system: Arc<RwLock<Option<SystemSettings>>>,
    prefs: Arc<RwLock<HashMap<UserId, UserPreferences>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_system(&self) -> Result<Option<SystemSettings>> {
        Ok(*self.system.read().await)
    }

    async fn put_system(&self, settings: SystemSettings) -> Result<()> {
        *self.system.write().await = Some(settings);
        Ok(())
    }

    async fn get_prefs(&self, user: UserId) -> Result<Option<UserPreferences>> {
        Ok(self.prefs.read().await.get(&user).copied())
    }

    async fn put_prefs(&self, user: UserId, prefs: UserPreferences) -> Result<()> {
        self.prefs.write().await.insert(user, prefs);
        Ok(())
    }
}
