//! Player profiles, attribute vectors, and the background catalog.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::story::StoryError;

/// Base value every stat starts at before background bonuses.
pub const BASE_STAT: i32 = 2;

/// The six named attributes every profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Tech,
    Arts,
    Guts,
    Social,
    Bio,
    Lore,
}

impl Stat {
    /// All stats in display order.
    pub const ALL: [Stat; 6] = [
        Stat::Tech,
        Stat::Arts,
        Stat::Guts,
        Stat::Social,
        Stat::Bio,
        Stat::Lore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tech => "Tech",
            Self::Arts => "Arts",
            Self::Guts => "Guts",
            Self::Social => "Social",
            Self::Bio => "Bio",
            Self::Lore => "Lore",
        }
    }

    /// Case-insensitive lookup, so `tech`, `Tech` and `TECH` all match.
    pub fn parse(s: &str) -> Option<Stat> {
        Self::ALL
            .into_iter()
            .find(|stat| stat.name().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed attribute vector. Values are unbounded in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stats {
    pub tech: i32,
    pub arts: i32,
    pub guts: i32,
    pub social: i32,
    pub bio: i32,
    pub lore: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::uniform(BASE_STAT)
    }
}

impl Stats {
    pub fn uniform(value: i32) -> Self {
        Self {
            tech: value,
            arts: value,
            guts: value,
            social: value,
            bio: value,
            lore: value,
        }
    }

    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Tech => self.tech,
            Stat::Arts => self.arts,
            Stat::Guts => self.guts,
            Stat::Social => self.social,
            Stat::Bio => self.bio,
            Stat::Lore => self.lore,
        }
    }

    pub fn get_mut(&mut self, stat: Stat) -> &mut i32 {
        match stat {
            Stat::Tech => &mut self.tech,
            Stat::Arts => &mut self.arts,
            Stat::Guts => &mut self.guts,
            Stat::Social => &mut self.social,
            Stat::Bio => &mut self.bio,
            Stat::Lore => &mut self.lore,
        }
    }

    /// Iterate `(stat, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Stat, i32)> + '_ {
        Stat::ALL.into_iter().map(move |stat| (stat, self.get(stat)))
    }

    /// The stat holding the strictly highest value, or `None` on a tie.
    pub fn unique_max(&self) -> Option<Stat> {
        let mut best: Option<(Stat, i32)> = None;
        let mut tied = false;
        for (stat, value) in self.iter() {
            match best {
                Some((_, top)) if value > top => {
                    best = Some((stat, value));
                    tied = false;
                }
                Some((_, top)) if value == top => tied = true,
                None => best = Some((stat, value)),
                _ => {}
            }
        }
        if tied {
            None
        } else {
            best.map(|(stat, _)| stat)
        }
    }

    /// Element-wise sum, used for the team synergy display.
    pub fn combined(&self, other: &Stats) -> Stats {
        let mut sum = *self;
        for stat in Stat::ALL {
            *sum.get_mut(stat) += other.get(stat);
        }
        sum
    }
}

/// Biographical fields populated from free-form player answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BioField {
    Age,
    Gender,
    Origin,
    Height,
}

impl BioField {
    pub fn parse(s: &str) -> Option<BioField> {
        match s.trim().to_lowercase().as_str() {
            "age" => Some(Self::Age),
            "gender" => Some(Self::Gender),
            "origin" => Some(Self::Origin),
            "height" => Some(Self::Height),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Origin => "origin",
            Self::Height => "height",
        }
    }
}

/// One player-controlled participant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// Identifier into the background catalog; empty until chosen.
    #[serde(rename = "class")]
    pub background_id: String,
    pub age: String,
    pub gender: String,
    pub origin: String,
    pub height: String,
    pub stats: Stats,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Stand-in partner for solo players who skip configuring one.
    pub fn auto_partner() -> Self {
        Self {
            name: "The Other".to_string(),
            background_id: "adventurer".to_string(),
            ..Self::default()
        }
    }

    /// Set the background and add its bonuses. No ceiling is enforced here.
    pub fn apply_background(&mut self, background: &Background) -> &mut Self {
        self.background_id = background.id.clone();
        for (stat, bonus) in &background.bonus {
            *self.stats.get_mut(*stat) += bonus;
        }
        log::debug!(
            "applied background '{}' to {}: {:?}",
            background.id,
            self.name,
            self.stats
        );
        self
    }

    /// Overwrite one biographical field.
    pub fn record_attribute(&mut self, field: BioField, value: impl Into<String>) {
        let value = value.into();
        match field {
            BioField::Age => self.age = value,
            BioField::Gender => self.gender = value,
            BioField::Origin => self.origin = value,
            BioField::Height => self.height = value,
        }
    }

    pub fn attribute(&self, field: BioField) -> &str {
        match field {
            BioField::Age => &self.age,
            BioField::Gender => &self.gender,
            BioField::Origin => &self.origin,
            BioField::Height => &self.height,
        }
    }
}

/// A character-creation background: a named bundle of stat bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Background")]
pub struct Background {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub bonus: FxHashMap<Stat, i32>,
}

/// Ordered list of backgrounds, as presented to the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundCatalog {
    pub backgrounds: Vec<Background>,
}

impl BackgroundCatalog {
    pub fn load_from_ron(path: &Path) -> Result<BackgroundCatalog, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<BackgroundCatalog, StoryError> {
        Ok(ron::from_str(input)?)
    }

    /// Parse the original web format: `{ "backgrounds": [...] }`.
    pub fn parse_json(input: &str) -> Result<BackgroundCatalog, StoryError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load by file extension: `.json` is JSON, anything else RON.
    pub fn load(path: &Path) -> Result<BackgroundCatalog, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json(&contents)
        } else {
            Self::parse_ron(&contents)
        }
    }

    pub fn get(&self, id: &str) -> Option<&Background> {
        self.backgrounds.iter().find(|b| b.id == id)
    }

    /// Resolve a 1-based menu answer such as `"2"`. Invalid input is `None`
    /// and the caller reprompts.
    pub fn select(&self, answer: &str) -> Option<&Background> {
        let index: usize = answer.trim().parse().ok()?;
        index.checked_sub(1).and_then(|i| self.backgrounds.get(i))
    }

    pub fn len(&self) -> usize {
        self.backgrounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backgrounds.is_empty()
    }
}
