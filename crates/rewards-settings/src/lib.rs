pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::SettingsResolver;
pub use store::{MemorySettingsStore, SettingsStore};
pub use types::{
    AiFeatures, AiFeaturesPatch, AiSettings, AiSettingsPatch, EffectiveSettings, SystemSettings,
    SystemSettingsPatch, UsageLimits, UsageLimitsPatch, UserPreferences, UserPreferencesPatch,
};
