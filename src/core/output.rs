//! Output sink collaborator and an in-memory transcript implementation.

use serde::Serialize;

use crate::schema::profile::{Profile, Stat, Stats};
use crate::schema::story::{Fx, ImageAttachment, Source, Telemetry};

/// Presentation voice of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StyleTag {
    Story,
    Ai,
    System,
}

impl StyleTag {
    /// Story and AI lines are narrative passages; system lines are chrome.
    pub fn is_passage(&self) -> bool {
        matches!(self, Self::Story | Self::Ai)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRow {
    pub stat: Stat,
    pub value: i32,
    pub max: i32,
    /// Bar fill, clamped to 0..=100 even when the stored value exceeds `max`.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCard {
    pub title: String,
    pub subtitle: String,
    pub rows: Vec<StatRow>,
}

impl StatCard {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, stats: &Stats, max: i32) -> Self {
        let rows = stats
            .iter()
            .map(|(stat, value)| StatRow {
                stat,
                value,
                max,
                percent: percent_of(value, max),
            })
            .collect();
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            rows,
        }
    }

    /// Card shown after a background is chosen.
    pub fn for_profile(profile: &Profile, background_name: &str, max: i32) -> Self {
        Self::new(profile.name.clone(), background_name, &profile.stats, max)
    }

    /// Combined potential of both participants.
    pub fn synergy(player: &Profile, partner: &Profile, max: i32) -> Self {
        Self::new(
            "TEAM SYNERGY",
            "COMBINED POTENTIAL",
            &player.stats.combined(&partner.stats),
            max,
        )
    }
}

fn percent_of(value: i32, max: i32) -> u32 {
    if max <= 0 {
        return 0;
    }
    let pct = (i64::from(value) * 100) / i64::from(max);
    pct.clamp(0, 100) as u32
}

/// One selectable option as presented to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub index: usize,
    pub text: String,
    pub enabled: bool,
}

/// A unit of transcript output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    Line {
        style: StyleTag,
        fx: Option<Fx>,
        content: String,
    },
    Header {
        title: String,
        telemetry: Option<Telemetry>,
    },
    StatCard(StatCard),
    Image(ImageAttachment),
    Choices(Vec<ChoiceOption>),
    Sources(Vec<Source>),
}

impl Block {
    pub fn system(content: impl Into<String>) -> Self {
        Block::Line {
            style: StyleTag::System,
            fx: None,
            content: content.into(),
        }
    }

    pub fn is_passage(&self) -> bool {
        matches!(self, Block::Line { style, .. } if style.is_passage())
    }
}

/// Where rendered output goes. `emit` is the instantaneous path
/// (`animate = false`); the reveal scheduler drives the progressive path
/// through `open_line` / `append` / `set_line` / `close_line`.
pub trait OutputSink {
    fn emit(&mut self, block: Block);

    /// Start a line that will be filled progressively.
    fn open_line(&mut self, style: StyleTag, fx: Option<Fx>);

    /// Append one reveal step to the open line.
    fn append(&mut self, fragment: &str);

    /// Replace the open line's content with its final form.
    fn set_line(&mut self, content: &str);

    fn close_line(&mut self) {}

    /// Remove output back to and including the most recent passage.
    fn retract_passage(&mut self) {}
}

/// In-memory sink that records every block in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    blocks: Vec<Block>,
    #[serde(skip)]
    open: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Contents of every narrative passage, in order.
    pub fn passages(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Line { style, content, .. } if style.is_passage() => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Contents of every system line, in order.
    pub fn system_lines(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Line {
                    style: StyleTag::System,
                    content,
                    ..
                } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Blocks added since `from`, for incremental consumers.
    pub fn since(&self, from: usize) -> &[Block] {
        &self.blocks[from.min(self.blocks.len())..]
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.open = None;
    }

    fn open_content(&mut self) -> Option<&mut String> {
        let idx = self.open?;
        match self.blocks.get_mut(idx) {
            Some(Block::Line { content, .. }) => Some(content),
            _ => None,
        }
    }
}

impl OutputSink for Transcript {
    fn emit(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn open_line(&mut self, style: StyleTag, fx: Option<Fx>) {
        self.blocks.push(Block::Line {
            style,
            fx,
            content: String::new(),
        });
        self.open = Some(self.blocks.len() - 1);
    }

    fn append(&mut self, fragment: &str) {
        if let Some(content) = self.open_content() {
            content.push_str(fragment);
        }
    }

    fn set_line(&mut self, full: &str) {
        if let Some(content) = self.open_content() {
            content.clear();
            content.push_str(full);
        }
    }

    fn close_line(&mut self) {
        self.open = None;
    }

    fn retract_passage(&mut self) {
        self.open = None;
        while let Some(block) = self.blocks.pop() {
            if block.is_passage() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        let mut stats = Stats::default();
        stats.tech = 14;
        stats.lore = -1;
        let card = StatCard::new("Ava", "Engineer", &stats, 10);
        let tech = card.rows.iter().find(|r| r.stat == Stat::Tech).unwrap();
        assert_eq!(tech.value, 14);
        assert_eq!(tech.percent, 100);
        let lore = card.rows.iter().find(|r| r.stat == Stat::Lore).unwrap();
        assert_eq!(lore.percent, 0);
        let arts = card.rows.iter().find(|r| r.stat == Stat::Arts).unwrap();
        assert_eq!(arts.percent, 20);
    }

    #[test]
    fn synergy_card_sums_profiles() {
        let a = Profile::new("A");
        let b = Profile::new("B");
        let card = StatCard::synergy(&a, &b, 20);
        assert!(card.rows.iter().all(|r| r.value == 4 && r.percent == 20));
    }

    #[test]
    fn progressive_line_accumulates() {
        let mut t = Transcript::new();
        t.open_line(StyleTag::Story, None);
        t.append("He");
        t.append("llo");
        t.close_line();
        t.append("ignored");
        assert_eq!(t.passages(), vec!["Hello"]);
    }

    #[test]
    fn set_line_replaces_partial_content() {
        let mut t = Transcript::new();
        t.open_line(StyleTag::Ai, None);
        t.append("Hal");
        t.set_line("Halt!");
        t.close_line();
        assert_eq!(t.passages(), vec!["Halt!"]);
    }

    #[test]
    fn retract_removes_through_last_passage() {
        let mut t = Transcript::new();
        t.emit(Block::Line {
            style: StyleTag::Story,
            fx: None,
            content: "first".to_string(),
        });
        t.emit(Block::Line {
            style: StyleTag::Story,
            fx: None,
            content: "second".to_string(),
        });
        t.emit(Block::Choices(vec![]));
        t.emit(Block::system(">> note"));
        t.retract_passage();
        assert_eq!(t.passages(), vec!["first"]);
        assert_eq!(t.len(), 1);
    }
}
