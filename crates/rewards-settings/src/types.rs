use serde::{Deserialize, Serialize};

/// Per-feature AI flags. One struct serves three layers: system policy,
/// user preference, and the effective AND of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFeatures {
    pub smart_matching: bool,
    pub auto_description: bool,
    pub chat_assistant: bool,
}

impl Default for AiFeatures {
    fn default() -> Self {
        Self {
            smart_matching: true,
            auto_description: true,
            chat_assistant: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AiSettings {
    pub enabled: bool,
    pub features: AiFeatures,
}

impl AiSettings {
    pub fn enabled_defaults() -> Self {
        Self {
            enabled: true,
            features: AiFeatures::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub max_tasks_per_day: u32,
    pub max_withdrawals_per_week: u32,
    pub min_payout: u64,
    pub ai_request_cap: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            max_tasks_per_day: 10,
            max_withdrawals_per_week: 2,
            min_payout: 500,
            ai_request_cap: 50,
        }
    }
}

/// Admin-controlled singleton. Seeded with these defaults on first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub ai: AiSettings,
    pub limits: UsageLimits,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            ai: AiSettings::enabled_defaults(),
            limits: UsageLimits::default(),
        }
    }
}

/// Per-user opt-in flags. Absent preference means all-true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub smart_matching: bool,
    pub auto_description: bool,
    pub chat_assistant: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            smart_matching: true,
            auto_description: true,
            chat_assistant: true,
        }
    }
}

// Patch structs: a `None` field keeps the current value. Nested sections
// merge field-by-field, never wholesale.

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AiFeaturesPatch {
    pub smart_matching: Option<bool>,
    pub auto_description: Option<bool>,
    pub chat_assistant: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AiSettingsPatch {
    pub enabled: Option<bool>,
    pub features: Option<AiFeaturesPatch>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageLimitsPatch {
    pub max_tasks_per_day: Option<u32>,
    pub max_withdrawals_per_week: Option<u32>,
    pub min_payout: Option<u64>,
    pub ai_request_cap: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemSettingsPatch {
    pub ai: Option<AiSettingsPatch>,
    pub limits: Option<UsageLimitsPatch>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserPreferencesPatch {
    pub smart_matching: Option<bool>,
    pub auto_description: Option<bool>,
    pub chat_assistant: Option<bool>,
}

impl SystemSettings {
    pub fn apply(&mut self, patch: &SystemSettingsPatch) {
        if let Some(ai) = &patch.ai {
            if let Some(enabled) = ai.enabled {
                self.ai.enabled = enabled;
            }
            if let Some(features) = &ai.features {
                if let Some(v) = features.smart_matching {
                    self.ai.features.smart_matching = v;
                }
                if let Some(v) = features.auto_description {
                    self.ai.features.auto_description = v;
                }
                if let Some(v) = features.chat_assistant {
                    self.ai.features.chat_assistant = v;
                }
            }
        }
        if let Some(limits) = &patch.limits {
            if let Some(v) = limits.max_tasks_per_day {
                self.limits.max_tasks_per_day = v;
            }
            if let Some(v) = limits.max_withdrawals_per_week {
                self.limits.max_withdrawals_per_week = v;
            }
            if let Some(v) = limits.min_payout {
                self.limits.min_payout = v;
            }
            if let Some(v) = limits.ai_request_cap {
                self.limits.ai_request_cap = v;
            }
        }
    }
}

impl UserPreferences {
    pub fn apply(&mut self, patch: &UserPreferencesPatch) {
        if let Some(v) = patch.smart_matching {
            self.smart_matching = v;
        }
        if let Some(v) = patch.auto_description {
            self.auto_description = v;
        }
        if let Some(v) = patch.chat_assistant {
            self.chat_assistant = v;
        }
    }
}

/// AND of system policy and user preference; admin disablement is an
/// absolute veto. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub ai_enabled: bool,
    pub ai: AiFeatures,
    pub limits: UsageLimits,
}

impl EffectiveSettings {
    pub fn resolve(system: &SystemSettings, prefs: &UserPreferences) -> Self {
        let gate = system.ai.enabled;
        Self {
            ai_enabled: gate,
            ai: AiFeatures {
                smart_matching: gate && system.ai.features.smart_matching && prefs.smart_matching,
                auto_description: gate
                    && system.ai.features.auto_description
                    && prefs.auto_description,
                chat_assistant: gate && system.ai.features.chat_assistant && prefs.chat_assistant,
            },
            // No per-user override of numeric limits
            limits: system.limits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_field_by_field() {
        let mut settings = SystemSettings::default();
        settings.apply(&SystemSettingsPatch {
            ai: Some(AiSettingsPatch {
                enabled: None,
                features: Some(AiFeaturesPatch {
                    chat_assistant: Some(false),
                    ..Default::default()
                }),
            }),
            limits: Some(UsageLimitsPatch {
                min_payout: Some(1_000),
                ..Default::default()
            }),
        });

        // Untouched fields keep their values
        assert!(settings.ai.enabled);
        assert!(settings.ai.features.smart_matching);
        assert!(!settings.ai.features.chat_assistant);
        assert_eq!(settings.limits.min_payout, 1_000);
        assert_eq!(settings.limits.max_tasks_per_day, 10);
    }

    #[test]
    fn test_admin_veto_overrides_everything() {
        let mut system = SystemSettings::default();
        system.ai.enabled = false;
        let prefs = UserPreferences::default();

        let effective = EffectiveSettings::resolve(&system, &prefs);
        assert!(!effective.ai_enabled);
        assert!(!effective.ai.smart_matching);
        assert!(!effective.ai.auto_description);
        assert!(!effective.ai.chat_assistant);
    }

    #[test]
    fn test_user_opt_out_respected() {
        let system = SystemSettings::default();
        let prefs = UserPreferences {
            chat_assistant: false,
            ..Default::default()
        };

        let effective = EffectiveSettings::resolve(&system, &prefs);
        assert!(effective.ai.smart_matching);
        assert!(!effective.ai.chat_assistant);
    }

    #[test]
    fn test_all_layers_true_yields_true() {
        let effective =
            EffectiveSettings::resolve(&SystemSettings::default(), &UserPreferences::default());
        assert!(effective.ai.smart_matching);
        assert!(effective.ai.auto_description);
        assert!(effective.ai.chat_assistant);
    }
}
