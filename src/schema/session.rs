//! The session aggregate and its bounded rollback history.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::profile::Profile;
use super::story::LootItem;

/// Default bound on the rollback stack.
pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Solo,
    Coop,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Mode> {
        match s.trim().to_lowercase().as_str() {
            "solo" => Some(Self::Solo),
            "coop" => Some(Self::Coop),
            _ => None,
        }
    }
}

/// A `{chapter, scene}` position that rollback can return to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "chapterId")]
    pub chapter_id: String,
    #[serde(rename = "index")]
    pub scene_index: usize,
}

impl Checkpoint {
    pub fn new(chapter_id: impl Into<String>, scene_index: usize) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            scene_index,
        }
    }
}

/// Bounded stack of checkpoints. Pushing past the cap drops the oldest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<Checkpoint>,
    #[serde(skip, default = "default_cap")]
    cap: usize,
}

fn default_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

impl Default for History {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

// The cap is configuration, not state; two histories are equal when their
// checkpoints are.
impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl History {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn push(&mut self, checkpoint: Checkpoint) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(checkpoint);
    }

    pub fn pop(&mut self) -> Option<Checkpoint> {
        self.entries.pop_back()
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Everything a play-through owns. Created at game start, restored from a
/// snapshot, or discarded by an explicit wipe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    pub mode: Mode,
    pub player: Profile,
    pub partner: Profile,
    /// Role labels, empty until the designation prompt is answered.
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub passenger: String,
    #[serde(default)]
    pub inventory: Vec<LootItem>,
    #[serde(default)]
    pub history: History,
}

impl Session {
    pub fn new(mode: Mode, player: Profile, partner: Profile) -> Self {
        Self {
            mode,
            player,
            partner,
            ..Self::default()
        }
    }

    /// Driver label, falling back to the player's name until assigned.
    pub fn driver_or_default(&self) -> &str {
        if self.driver.is_empty() {
            &self.player.name
        } else {
            &self.driver
        }
    }

    /// Passenger label, falling back to the partner's name until assigned.
    pub fn passenger_or_default(&self) -> &str {
        if self.passenger.is_empty() {
            &self.partner.name
        } else {
            &self.passenger
        }
    }

    /// Assign roles from a free-text answer naming the passenger: if the
    /// answer contains the player's name, the player rides and the partner
    /// drives; otherwise the other way round.
    pub fn designate_roles(&mut self, answer: &str) {
        let answer = answer.to_lowercase();
        if answer.contains(&self.player.name.to_lowercase()) {
            self.passenger = self.player.name.clone();
            self.driver = self.partner.name.clone();
        } else {
            self.passenger = self.partner.name.clone();
            self.driver = self.player.name.clone();
        }
    }

    pub fn acquire(&mut self, item: LootItem) {
        self.inventory.push(item);
    }
}
