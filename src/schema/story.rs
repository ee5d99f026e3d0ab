//! Story data: chapters, scenes, text variants, and choices.
//!
//! Story files use a loose authoring shape (string tags, optional fields).
//! Everything is parsed into typed values once, at load time.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::profile::{BioField, Stat};
use super::session::Mode;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid condition '{0}'")]
    InvalidCondition(String),
    #[error("start chapter '{0}' does not exist")]
    MissingStart(String),
    #[error("unknown stat '{0}'")]
    UnknownStat(String),
    #[error("chapter '{chapter}' scene {index}: {reason}")]
    InvalidScene {
        chapter: String,
        index: usize,
        reason: String,
    },
}

/// A variant's applicability test, evaluated against one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Default,
    /// Exact background-id match.
    ClassMatch(String),
    /// Case-insensitive substring of the profile's origin.
    OriginContains(String),
    /// Case-insensitive substring of the profile's gender.
    GenderContains(String),
    /// Both stats at or above the synergy threshold.
    SynergyPair(Stat, Stat),
    /// The stat is the profile's unique maximum.
    HighestStat(Stat),
}

impl Condition {
    /// Parse an authoring tag such as `default`, `origin:india`,
    /// `synergy:tech_lore` or `high_guts`. Any other tag is a background id.
    pub fn parse(tag: &str) -> Result<Condition, StoryError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(StoryError::InvalidCondition(tag.to_string()));
        }
        if tag == "default" {
            return Ok(Condition::Default);
        }
        if let Some(needle) = tag.strip_prefix("origin:") {
            return Ok(Condition::OriginContains(parse_needle(tag, needle)?));
        }
        if let Some(needle) = tag.strip_prefix("gender:") {
            return Ok(Condition::GenderContains(parse_needle(tag, needle)?));
        }
        if let Some(pair) = tag.strip_prefix("synergy:") {
            let (a, b) = pair
                .split_once('_')
                .ok_or_else(|| StoryError::InvalidCondition(tag.to_string()))?;
            return Ok(Condition::SynergyPair(parse_stat(a)?, parse_stat(b)?));
        }
        if let Some(stat) = tag.strip_prefix("high_") {
            return Ok(Condition::HighestStat(parse_stat(stat)?));
        }
        Ok(Condition::ClassMatch(tag.to_string()))
    }
}

/// An empty needle would match every profile.
fn parse_needle(tag: &str, needle: &str) -> Result<String, StoryError> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(StoryError::InvalidCondition(tag.to_string()));
    }
    Ok(needle.to_lowercase())
}

fn parse_stat(s: &str) -> Result<Stat, StoryError> {
    Stat::parse(s).ok_or_else(|| StoryError::UnknownStat(s.to_string()))
}

/// A condition-tagged candidate text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVariant {
    pub condition: Condition,
    pub text: String,
}

/// Whose attributes drive resolution, and which voice renders the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Focus {
    #[default]
    Player,
    Partner,
    Ai,
    System,
}

impl Focus {
    fn parse(s: &str) -> Option<Focus> {
        match s {
            "player" => Some(Self::Player),
            "partner" => Some(Self::Partner),
            "ai" => Some(Self::Ai),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Visual effect applied to a revealed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fx {
    Shake,
    Heat,
    Cold,
}

impl Fx {
    fn parse(s: &str) -> Option<Fx> {
        match s {
            "shake" => Some(Self::Shake),
            "heat" => Some(Self::Heat),
            "cold" => Some(Self::Cold),
            _ => None,
        }
    }
}

/// What a free-input scene expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Bio(BioField),
    /// Any non-biometric prompt; answered by naming the passenger.
    RoleDesignation(String),
}

impl InputKind {
    pub fn parse(tag: &str) -> InputKind {
        match BioField::parse(tag) {
            Some(field) => InputKind::Bio(field),
            None => InputKind::RoleDesignation(tag.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub src: String,
    pub caption: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootItem {
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

/// Stat gate on a choice: `stats[stat] >= min_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub stat: Stat,
    pub min_value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub requirement: Option<Requirement>,
    pub loot: Option<LootItem>,
    /// Absent means "next scene in this chapter".
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneKind {
    Text {
        image: Option<ImageAttachment>,
        fx: Option<Fx>,
    },
    Input(InputKind),
    Choice(Vec<Choice>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub variants: Vec<TextVariant>,
    pub focus: Focus,
    pub mode_requirement: Option<Mode>,
    pub kind: SceneKind,
}

impl Scene {
    /// A scene is visible unless it demands a different mode.
    pub fn visible_in(&self, mode: Mode) -> bool {
        self.mode_requirement.map_or(true, |required| required == mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub loc: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub telemetry: Option<Telemetry>,
    pub show_synergy: bool,
    pub sources: Vec<Source>,
    pub next_chapter: Option<String>,
    pub scenes: Vec<Scene>,
}

/// All chapters keyed by id, plus the chapter a new game starts in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub start: String,
    pub chapters: FxHashMap<String, Chapter>,
}

// Authoring shapes. RON and JSON share these, so tags stay strings here.

#[derive(Debug, Deserialize)]
#[serde(rename = "Story")]
struct RawStory {
    #[serde(default)]
    start: Option<String>,
    chapters: FxHashMap<String, RawChapter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Chapter")]
struct RawChapter {
    #[serde(default)]
    title: String,
    #[serde(default)]
    telemetry: Option<Telemetry>,
    #[serde(default)]
    show_synergy: bool,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    next_chapter: Option<String>,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Scene")]
struct RawScene {
    #[serde(default)]
    text_blocks: Vec<RawVariant>,
    #[serde(default)]
    focus: Option<String>,
    #[serde(default)]
    mode_req: Option<String>,
    #[serde(default)]
    input_prompt: Option<String>,
    #[serde(default)]
    choices: Option<Vec<RawChoice>>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_caption: Option<String>,
    #[serde(default)]
    image_source: Option<String>,
    #[serde(default)]
    fx: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    condition: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    text: String,
    #[serde(default)]
    req: Option<RawRequirement>,
    #[serde(default)]
    loot: Option<LootItem>,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequirement {
    stat: String,
    val: i32,
}

impl Story {
    /// Load a story from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Load by file extension: `.json` is JSON, anything else RON.
    pub fn load(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json(&contents)
        } else {
            Self::parse_ron(&contents)
        }
    }

    pub fn parse_ron(input: &str) -> Result<Story, StoryError> {
        let raw: RawStory = ron::from_str(input)?;
        Self::from_raw(raw)
    }

    pub fn parse_json(input: &str) -> Result<Story, StoryError> {
        let raw: RawStory = serde_json::from_str(input)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawStory) -> Result<Story, StoryError> {
        let mut chapters = FxHashMap::default();
        for (id, raw_chapter) in raw.chapters {
            let chapter = build_chapter(&id, raw_chapter)?;
            chapters.insert(id, chapter);
        }

        // Without an explicit start, fall back to the conventional first id.
        let start = raw.start.unwrap_or_else(|| "prologue".to_string());
        Ok(Story { start, chapters })
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.get(id)
    }

    /// Merge another story into this one. Chapters from `other` override
    /// chapters with the same id; `start` is kept.
    pub fn merge(&mut self, other: Story) {
        for (id, chapter) in other.chapters {
            self.chapters.insert(id, chapter);
        }
    }
}

fn build_chapter(id: &str, raw: RawChapter) -> Result<Chapter, StoryError> {
    let mut scenes = Vec::with_capacity(raw.scenes.len());
    for (index, raw_scene) in raw.scenes.into_iter().enumerate() {
        scenes.push(build_scene(id, index, raw_scene)?);
    }
    Ok(Chapter {
        id: id.to_string(),
        title: raw.title,
        telemetry: raw.telemetry,
        show_synergy: raw.show_synergy,
        sources: raw.sources,
        next_chapter: raw.next_chapter,
        scenes,
    })
}

fn build_scene(chapter: &str, index: usize, raw: RawScene) -> Result<Scene, StoryError> {
    let invalid = |reason: String| StoryError::InvalidScene {
        chapter: chapter.to_string(),
        index,
        reason,
    };

    let mut variants = Vec::with_capacity(raw.text_blocks.len());
    for block in raw.text_blocks {
        variants.push(TextVariant {
            condition: Condition::parse(&block.condition)?,
            text: block.text,
        });
    }

    let focus = match raw.focus.as_deref() {
        None => Focus::Player,
        Some(tag) => Focus::parse(tag).ok_or_else(|| invalid(format!("unknown focus '{}'", tag)))?,
    };

    let mode_requirement = match raw.mode_req.as_deref() {
        None => None,
        Some(tag) => Some(
            Mode::parse(tag).ok_or_else(|| invalid(format!("unknown mode '{}'", tag)))?,
        ),
    };

    let kind = match (raw.input_prompt, raw.choices) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                "a scene cannot be both an input prompt and a choice".to_string(),
            ))
        }
        (Some(tag), None) => SceneKind::Input(InputKind::parse(&tag)),
        (None, Some(raw_choices)) => {
            if raw_choices.is_empty() {
                return Err(invalid("choice scene has no choices".to_string()));
            }
            let mut choices = Vec::with_capacity(raw_choices.len());
            for c in raw_choices {
                let requirement = match c.req {
                    Some(req) => Some(Requirement {
                        stat: parse_stat(&req.stat)?,
                        min_value: req.val,
                    }),
                    None => None,
                };
                choices.push(Choice {
                    text: c.text,
                    requirement,
                    loot: c.loot,
                    target: c.target,
                });
            }
            SceneKind::Choice(choices)
        }
        (None, None) => {
            let fx = match raw.fx.as_deref() {
                None => None,
                Some(tag) => {
                    Some(Fx::parse(tag).ok_or_else(|| invalid(format!("unknown fx '{}'", tag)))?)
                }
            };
            let image = raw.image.map(|src| ImageAttachment {
                src,
                caption: raw.image_caption,
                source: raw.image_source,
            });
            SceneKind::Text { image, fx }
        }
    };

    Ok(Scene {
        variants,
        focus,
        mode_requirement,
        kind,
    })
}
