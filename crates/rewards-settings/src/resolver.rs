use crate::store::SettingsStore;
use crate::types::{
    EffectiveSettings, SystemSettings, SystemSettingsPatch, UserPreferences, UserPreferencesPatch,
};
use rewards_types::{Result, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Merges global admin policy with per-user preference. The write lock
/// covers default seeding and every update, so concurrent first readers
/// cannot double-create the singleton and updates never interleave.
pub struct SettingsResolver {
    store: Arc<dyn SettingsStore>,
    write_lock: Mutex<()>,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads the singleton, seeding the fixed defaults on first access.
    pub async fn get_system_settings(&self) -> Result<SystemSettings> {
        if let Some(settings) = self.store.get_system().await? {
            return Ok(settings);
        }

        let _guard = self.write_lock.lock().await;
        // Another first-reader may have seeded while we waited
        if let Some(settings) = self.store.get_system().await? {
            return Ok(settings);
        }

        let defaults = SystemSettings::default();
        self.store.put_system(defaults).await?;
        info!("⚙️ System settings seeded with defaults");
        Ok(defaults)
    }

    pub async fn update_system_settings(
        &self,
        patch: SystemSettingsPatch,
    ) -> Result<SystemSettings> {
        let _guard = self.write_lock.lock().await;

        let mut settings = self
            .store
            .get_system()
            .await?
            .unwrap_or_default();
        settings.apply(&patch);
        self.store.put_system(settings).await?;

        info!(
            ai_enabled = settings.ai.enabled,
            max_tasks_per_day = settings.limits.max_tasks_per_day,
            min_payout = settings.limits.min_payout,
            "⚙️ System settings updated"
        );
        Ok(settings)
    }

    pub async fn get_effective_settings(&self, user: UserId) -> Result<EffectiveSettings> {
        let system = self.get_system_settings().await?;
        let prefs = self.store.get_prefs(user).await?.unwrap_or_default();
        Ok(EffectiveSettings::resolve(&system, &prefs))
    }

    pub async fn update_user_preferences(
        &self,
        user: UserId,
        patch: UserPreferencesPatch,
    ) -> Result<UserPreferences> {
        let _guard = self.write_lock.lock().await;

        let mut prefs = self.store.get_prefs(user).await?.unwrap_or_default();
        prefs.apply(&patch);
        self.store.put_prefs(user, prefs).await?;

        info!(user = %user, "⚙️ User preferences updated");
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettingsStore;
    use crate::types::{AiSettingsPatch, UsageLimitsPatch};

    fn resolver() -> SettingsResolver {
        SettingsResolver::new(Arc::new(MemorySettingsStore::new()))
    }

    #[tokio::test]
    async fn test_first_read_seeds_defaults() {
        let resolver = resolver();
        let settings = resolver.get_system_settings().await.unwrap();
        assert!(settings.ai.enabled);
        assert_eq!(settings.limits.max_tasks_per_day, 10);

        // Second read returns the seeded value, not a fresh one
        assert_eq!(resolver.get_system_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_seed_once() {
        let resolver = Arc::new(resolver());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(
                async move { resolver.get_system_settings().await },
            ));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap().unwrap());
        }
        // Every reader observes the same settings
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_update_merges_into_seeded_settings() {
        let resolver = resolver();

        let updated = resolver
            .update_system_settings(SystemSettingsPatch {
                ai: Some(AiSettingsPatch {
                    enabled: Some(false),
                    features: None,
                }),
                limits: Some(UsageLimitsPatch {
                    ai_request_cap: Some(5),
                    ..Default::default()
                }),
            })
            .await
            .unwrap();

        assert!(!updated.ai.enabled);
        assert_eq!(updated.limits.ai_request_cap, 5);
        // Untouched nested fields survive
        assert!(updated.ai.features.smart_matching);
        assert_eq!(updated.limits.min_payout, 500);
    }

    #[tokio::test]
    async fn test_effective_settings_admin_veto() {
        let resolver = resolver();
        let user = UserId::new(1);

        resolver
            .update_user_preferences(user, UserPreferencesPatch::default())
            .await
            .unwrap();
        resolver
            .update_system_settings(SystemSettingsPatch {
                ai: Some(AiSettingsPatch {
                    enabled: Some(false),
                    features: None,
                }),
                limits: None,
            })
            .await
            .unwrap();

        let effective = resolver.get_effective_settings(user).await.unwrap();
        assert!(!effective.ai_enabled);
        assert!(!effective.ai.smart_matching);
        assert!(!effective.ai.chat_assistant);
    }

    #[tokio::test]
    async fn test_effective_settings_user_opt_out() {
        let resolver = resolver();
        let user = UserId::new(2);

        resolver
            .update_user_preferences(
                user,
                UserPreferencesPatch {
                    auto_description: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let effective = resolver.get_effective_settings(user).await.unwrap();
        assert!(effective.ai_enabled);
        assert!(!effective.ai.auto_description);
        assert!(effective.ai.smart_matching);
        // Limits pass through unmodified
        assert_eq!(effective.limits.min_payout, 500);
    }

    #[tokio::test]
    async fn test_preferences_default_all_true() {
        let resolver = resolver();
        let effective = resolver
            .get_effective_settings(UserId::new(3))
            .await
            .unwrap();
        assert!(effective.ai.smart_matching);
        assert!(effective.ai.auto_description);
        assert!(effective.ai.chat_assistant);
    }

    #[tokio::test]
    async fn test_preference_update_is_shallow_merge() {
        let resolver = resolver();
        let user = UserId::new(4);

        resolver
            .update_user_preferences(
                user,
                UserPreferencesPatch {
                    chat_assistant: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let prefs = resolver
            .update_user_preferences(
                user,
                UserPreferencesPatch {
                    smart_matching: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Earlier opt-out survives the later patch
        assert!(!prefs.chat_assistant);
        assert!(!prefs.smart_matching);
        assert!(prefs.auto_description);
    }
}
