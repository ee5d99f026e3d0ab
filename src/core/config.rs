//! Runtime tunables, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::output::StyleTag;
use crate::core::resolver::FALLBACK_TEXT;
use crate::schema::session::DEFAULT_HISTORY_CAP;
use crate::schema::story::StoryError;

/// Persistence key used when none is configured.
pub const DEFAULT_SAVE_KEY: &str = "CHRONOS_VELOCITY_V1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "RuntimeConfig", default)]
pub struct RuntimeConfig {
    /// Per-step reveal delay for story and system text.
    pub story_speed_ms: u64,
    /// Per-step reveal delay for AI-voiced text.
    pub ai_speed_ms: u64,
    pub history_cap: usize,
    /// In coop sessions, bio answers are only recorded while the scene
    /// index is below this. `None` records them everywhere.
    pub legacy_bio_window: Option<usize>,
    pub stat_display_max: i32,
    pub synergy_display_max: i32,
    pub save_key: String,
    pub fallback_text: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            story_speed_ms: 25,
            ai_speed_ms: 40,
            history_cap: DEFAULT_HISTORY_CAP,
            legacy_bio_window: Some(10),
            stat_display_max: 10,
            synergy_display_max: 20,
            save_key: DEFAULT_SAVE_KEY.to_string(),
            fallback_text: FALLBACK_TEXT.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_ron(path: &Path) -> Result<RuntimeConfig, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<RuntimeConfig, StoryError> {
        Ok(ron::from_str(input)?)
    }

    pub fn parse_json(input: &str) -> Result<RuntimeConfig, StoryError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load by file extension: `.json` is JSON, anything else RON.
    pub fn load(path: &Path) -> Result<RuntimeConfig, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json(&contents)
        } else {
            Self::parse_ron(&contents)
        }
    }

    /// Reveal step delay for a style.
    pub fn step_delay(&self, style: StyleTag) -> Duration {
        match style {
            StyleTag::Ai => Duration::from_millis(self.ai_speed_ms),
            StyleTag::Story | StyleTag::System => Duration::from_millis(self.story_speed_ms),
        }
    }

    /// Config with zero reveal delay, for hosts that print instantly.
    pub fn instant() -> Self {
        Self {
            story_speed_ms: 0,
            ai_speed_ms: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.history_cap, 50);
        assert_eq!(config.legacy_bio_window, Some(10));
        assert_eq!(config.step_delay(StyleTag::Ai), Duration::from_millis(40));
        assert_eq!(config.step_delay(StyleTag::Story), Duration::from_millis(25));
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = RuntimeConfig::parse_ron("(history_cap: 5, legacy_bio_window: None)").unwrap();
        assert_eq!(config.history_cap, 5);
        assert_eq!(config.legacy_bio_window, None);
        assert_eq!(config.save_key, DEFAULT_SAVE_KEY);
        assert_eq!(config.fallback_text, "Data Corrupted.");
    }

    #[test]
    fn json_config() {
        let config = RuntimeConfig::parse_json(r#"{"ai_speed_ms": 0, "save_key": "SLOT_2"}"#).unwrap();
        assert_eq!(config.step_delay(StyleTag::Ai), Duration::ZERO);
        assert_eq!(config.story_speed_ms, 25);
        assert_eq!(config.save_key, "SLOT_2");
    }
}
