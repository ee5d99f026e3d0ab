//! The narrative interpreter: walks chapters and scenes, gates choices,
//! takes free-text answers, and drives reveals, autosave, and rollback.
//!
//! The interpreter never owns the output surface. Every operation takes
//! the sink it should render into, and timing is supplied by the host
//! through [`Interpreter::tick`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::bio::{BioParser, BioReading};
use crate::core::config::RuntimeConfig;
use crate::core::output::{Block, ChoiceOption, OutputSink, StatCard, StyleTag};
use crate::core::persistence::{MemoryStore, Persistence, SaveStore, Snapshot};
use crate::core::resolver;
use crate::core::reveal::{RevealError, RevealScheduler, RevealStatus};
use crate::schema::profile::{BackgroundCatalog, Stat};
use crate::schema::session::{Checkpoint, Mode, Session};
use crate::schema::story::{
    Chapter, Choice, Focus, Fx, ImageAttachment, InputKind, SceneKind, Story, StoryError,
};

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("no story data was provided")]
    MissingStory,
    #[error("text is still being revealed")]
    Revealing,
    #[error("not waiting for a choice")]
    NotAwaitingChoice,
    #[error("not waiting for free input")]
    NotAwaitingInput,
    #[error("choice {index} is out of range ({count} options)")]
    InvalidChoice { index: usize, count: usize },
    #[error("requires {stat} {required}, have {actual}")]
    RequirementUnmet {
        stat: Stat,
        required: i32,
        actual: i32,
    },
    #[error("empty input")]
    EmptyInput,
    #[error("nothing to roll back to")]
    NothingToRollBack,
    #[error("not allowed while {0}")]
    InvalidState(&'static str),
    #[error("the story has ended")]
    Finished,
}

impl From<RevealError> for InterpreterError {
    fn from(_: RevealError) -> Self {
        InterpreterError::Revealing
    }
}

/// Observable interpreter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum InterpreterState {
    Idle,
    Revealing,
    AwaitingFreeInput,
    AwaitingChoice,
    EndOfChapter,
    EndOfArchive,
}

/// Where a restored session is being resumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOrigin {
    /// The player picked "resume" from the main menu; the chapter header is
    /// shown again.
    MainMenu,
    /// Silent restore, e.g. after a reload mid-chapter.
    InPlace,
}

/// What to do once the current reveal completes.
#[derive(Debug, Clone)]
enum AfterReveal {
    TextScene(Option<ImageAttachment>),
    InputPrompt(InputKind),
    ChoicePrompt(Vec<Choice>),
    /// Render the scene at the cursor.
    Continue,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Revealing(AfterReveal),
    AwaitingFreeInput(InputKind),
    AwaitingChoice(Vec<Choice>),
    EndOfChapter,
    EndOfArchive,
}

pub struct Interpreter {
    story: Story,
    catalog: BackgroundCatalog,
    config: RuntimeConfig,
    session: Session,
    persistence: Persistence,
    bio_parser: Option<Box<dyn BioParser>>,
    scheduler: RevealScheduler,
    chapter_id: String,
    cursor: usize,
    phase: Phase,
    citations_shown: bool,
    /// Narrative passages rendered under each history entry, aligned with
    /// the newest end of the history. Entries restored from a save count 1.
    passage_counts: Vec<usize>,
}

/// Builder for constructing an `Interpreter`.
pub struct InterpreterBuilder {
    story_path: Option<PathBuf>,
    backgrounds_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    /// Directly provided data (for testing without files).
    story: Option<Story>,
    catalog: Option<BackgroundCatalog>,
    config: Option<RuntimeConfig>,
    store: Option<Box<dyn SaveStore>>,
    bio_parser: Option<Box<dyn BioParser>>,
}

impl InterpreterBuilder {
    pub fn story_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.story_path = Some(path.into());
        self
    }

    pub fn backgrounds_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backgrounds_path = Some(path.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_story(mut self, story: Story) -> Self {
        self.story = Some(story);
        self
    }

    pub fn with_backgrounds(mut self, catalog: BackgroundCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Where snapshots go. Defaults to an in-memory store.
    pub fn store(mut self, store: Box<dyn SaveStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn bio_parser(mut self, parser: Box<dyn BioParser>) -> Self {
        self.bio_parser = Some(parser);
        self
    }

    /// Load all data and assemble the interpreter. A data error is fatal:
    /// it is reported once on `sink` and returned.
    pub fn build(self, sink: &mut dyn OutputSink) -> Result<Interpreter, InterpreterError> {
        match self.assemble() {
            Ok(interpreter) => Ok(interpreter),
            Err(e) => {
                log::error!("startup failed: {}", e);
                sink.emit(Block::system(format!("CRITICAL ERROR: {}", e)));
                Err(e)
            }
        }
    }

    fn assemble(self) -> Result<Interpreter, InterpreterError> {
        let config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => RuntimeConfig::load(path)?,
            (None, None) => RuntimeConfig::default(),
        };

        let mut story = self.story;
        if let Some(ref path) = self.story_path {
            let loaded = Story::load(path)?;
            match story.as_mut() {
                Some(existing) => existing.merge(loaded),
                None => story = Some(loaded),
            }
        }
        let story = story.ok_or(InterpreterError::MissingStory)?;
        if story.chapter(&story.start).is_none() {
            return Err(StoryError::MissingStart(story.start.clone()).into());
        }

        let catalog = match (self.catalog, &self.backgrounds_path) {
            (Some(catalog), _) => catalog,
            (None, Some(path)) => BackgroundCatalog::load(path)?,
            (None, None) => BackgroundCatalog::default(),
        };

        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()) as Box<dyn SaveStore>);
        let persistence = Persistence::new(store, config.save_key.clone());

        let mut session = Session::default();
        session.history.set_cap(config.history_cap);

        log::info!(
            "interpreter ready: {} chapters, {} backgrounds, start '{}'",
            story.chapters.len(),
            catalog.len(),
            story.start
        );

        Ok(Interpreter {
            chapter_id: story.start.clone(),
            story,
            catalog,
            config,
            session,
            persistence,
            bio_parser: self.bio_parser,
            scheduler: RevealScheduler::new(),
            cursor: 0,
            phase: Phase::Idle,
            citations_shown: false,
            passage_counts: Vec::new(),
        })
    }
}

impl Interpreter {
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder {
            story_path: None,
            backgrounds_path: None,
            config_path: None,
            story: None,
            catalog: None,
            config: None,
            store: None,
            bio_parser: None,
        }
    }

    // ----------------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------------

    pub fn state(&self) -> InterpreterState {
        match self.phase {
            Phase::Idle => InterpreterState::Idle,
            Phase::Revealing(_) => InterpreterState::Revealing,
            Phase::AwaitingFreeInput(_) => InterpreterState::AwaitingFreeInput,
            Phase::AwaitingChoice(_) => InterpreterState::AwaitingChoice,
            Phase::EndOfChapter => InterpreterState::EndOfChapter,
            Phase::EndOfArchive => InterpreterState::EndOfArchive,
        }
    }

    pub fn is_revealing(&self) -> bool {
        self.scheduler.is_revealing()
    }

    pub fn skip_requested(&self) -> bool {
        self.scheduler.skip_requested()
    }

    pub fn awaiting_choice(&self) -> bool {
        matches!(self.phase, Phase::AwaitingChoice(_))
    }

    pub fn awaiting_free_input(&self) -> bool {
        matches!(self.phase, Phase::AwaitingFreeInput(_))
    }

    pub fn current_input_kind(&self) -> Option<&InputKind> {
        match &self.phase {
            Phase::AwaitingFreeInput(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn current_choices(&self) -> Option<&[Choice]> {
        match &self.phase {
            Phase::AwaitingChoice(choices) => Some(choices),
            _ => None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn catalog(&self) -> &BackgroundCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.chapter_id.clone(), self.cursor)
    }

    // ----------------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------------

    /// Begin a new game with a freshly created session. Renders the opening
    /// chapter's header and waits for the first `advance`.
    pub fn start(&mut self, session: Session, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        if self.is_revealing() {
            return Err(InterpreterError::Revealing);
        }
        self.session = session;
        self.session.history.set_cap(self.config.history_cap);
        self.passage_counts.clear();
        self.phase = Phase::Idle;
        log::info!(
            "new {:?} session for {}",
            self.session.mode,
            self.session.player.name
        );
        let start = self.story.start.clone();
        self.enter_chapter(&start, true, sink);
        Ok(())
    }

    /// Restore a saved session and render the scene it was saved at.
    pub fn resume(
        &mut self,
        snapshot: Snapshot,
        origin: ResumeOrigin,
        sink: &mut dyn OutputSink,
    ) -> Result<(), InterpreterError> {
        if self.is_revealing() {
            return Err(InterpreterError::Revealing);
        }
        let (session, checkpoint) = snapshot.into_parts();
        self.session = session;
        self.session.history.set_cap(self.config.history_cap);
        self.passage_counts = vec![1; self.session.history.len()];
        self.phase = Phase::Idle;
        sink.emit(Block::system("RESTORING TIMELINE..."));
        log::info!(
            "resuming at {}:{}",
            checkpoint.chapter_id,
            checkpoint.scene_index
        );

        if !self.enter_chapter(&checkpoint.chapter_id, false, sink) {
            return Ok(());
        }
        if origin == ResumeOrigin::MainMenu {
            self.render_chapter_header(sink);
        }
        self.cursor = checkpoint.scene_index;

        // A save taken during rollback already holds this checkpoint.
        let record = self.session.history.last() != Some(&checkpoint);
        if !record {
            self.reset_top_passages();
        }
        self.play_current(sink, record)
    }

    /// Resume from the persisted save, if one exists.
    pub fn resume_saved(
        &mut self,
        origin: ResumeOrigin,
        sink: &mut dyn OutputSink,
    ) -> Result<bool, InterpreterError> {
        if !self.persistence.has_save() {
            return Ok(false);
        }
        match self.persistence.load() {
            Some(snapshot) => {
                self.resume(snapshot, origin, sink)?;
                Ok(true)
            }
            None => {
                sink.emit(Block::system("ERROR: SAVE CORRUPT."));
                Ok(false)
            }
        }
    }

    pub fn has_save(&self) -> bool {
        self.persistence.has_save()
    }

    /// Destroy the session and its save.
    pub fn wipe(&mut self) -> Result<(), InterpreterError> {
        if self.is_revealing() {
            return Err(InterpreterError::Revealing);
        }
        self.persistence.clear();
        self.session = Session::default();
        self.session.history.set_cap(self.config.history_cap);
        self.passage_counts.clear();
        self.chapter_id = self.story.start.clone();
        self.cursor = 0;
        self.citations_shown = false;
        self.phase = Phase::Idle;
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Commands
    // ----------------------------------------------------------------------

    /// Render the next visible scene, or step past the end of a chapter.
    pub fn advance(&mut self, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        match self.phase {
            Phase::Idle => self.play_current(sink, true),
            Phase::EndOfChapter => self.continue_after_chapter(sink),
            Phase::Revealing(_) => Err(InterpreterError::Revealing),
            Phase::AwaitingFreeInput(_) => Err(InterpreterError::InvalidState("awaiting input")),
            Phase::AwaitingChoice(_) => Err(InterpreterError::InvalidState("awaiting a choice")),
            Phase::EndOfArchive => Err(InterpreterError::Finished),
        }
    }

    /// Drive the active reveal by `elapsed` and run whatever follows it.
    pub fn tick(
        &mut self,
        sink: &mut dyn OutputSink,
        elapsed: Duration,
    ) -> Result<InterpreterState, InterpreterError> {
        if self.scheduler.advance(sink, elapsed) == RevealStatus::Complete {
            self.complete_reveal(sink)?;
        }
        Ok(self.state())
    }

    /// Finish the active reveal now. Idempotent; a no-op when idle.
    pub fn request_skip(&mut self, sink: &mut dyn OutputSink) -> Result<InterpreterState, InterpreterError> {
        if !self.is_revealing() {
            return Ok(self.state());
        }
        self.scheduler.request_skip();
        self.tick(sink, Duration::ZERO)
    }

    /// Answer the pending free-input prompt.
    pub fn submit(&mut self, sink: &mut dyn OutputSink, value: &str) -> Result<(), InterpreterError> {
        let kind = match &self.phase {
            Phase::AwaitingFreeInput(kind) => kind.clone(),
            Phase::Revealing(_) => return Err(InterpreterError::Revealing),
            _ => return Err(InterpreterError::NotAwaitingInput),
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(InterpreterError::EmptyInput);
        }
        self.phase = Phase::Idle;

        let reaction = match kind {
            InputKind::RoleDesignation(_) => {
                self.session.designate_roles(value);
                sink.emit(Block::system(format!(
                    ">> DRIVER DESIGNATED: {}",
                    self.session.driver.to_uppercase()
                )));
                None
            }
            InputKind::Bio(field) => {
                let reading = match &self.bio_parser {
                    Some(parser) => parser.classify(field, value),
                    None => {
                        log::warn!("no bio parser configured; logging raw {} value", field.name());
                        BioReading::default()
                    }
                };
                let logged = reading.display_text.unwrap_or_else(|| value.to_string());
                if self.records_bio_input() {
                    self.session.player.record_attribute(field, logged.clone());
                } else {
                    log::debug!(
                        "{} answer at scene {} not recorded in coop session",
                        field.name(),
                        self.cursor
                    );
                }
                sink.emit(Block::system(format!(">> DATA LOGGED: {}", logged.to_uppercase())));
                reading.reaction_text
            }
        };

        self.cursor += 1;
        match reaction {
            Some(text) => self.begin_reveal(sink, &text, StyleTag::Ai, None, AfterReveal::Continue),
            None => self.play_current(sink, true),
        }
    }

    /// Pick option `index` (zero-based) of the pending choice.
    pub fn select(&mut self, sink: &mut dyn OutputSink, index: usize) -> Result<(), InterpreterError> {
        let choice = match &self.phase {
            Phase::AwaitingChoice(choices) => match choices.get(index) {
                Some(choice) => choice.clone(),
                None => {
                    return Err(InterpreterError::InvalidChoice {
                        index,
                        count: choices.len(),
                    })
                }
            },
            Phase::Revealing(_) => return Err(InterpreterError::Revealing),
            _ => return Err(InterpreterError::NotAwaitingChoice),
        };

        if let Some(req) = choice.requirement {
            let actual = self.session.player.stats.get(req.stat);
            if actual < req.min_value {
                log::debug!("choice {} rejected: {} {} < {}", index, req.stat, actual, req.min_value);
                return Err(InterpreterError::RequirementUnmet {
                    stat: req.stat,
                    required: req.min_value,
                    actual,
                });
            }
        }

        self.phase = Phase::Idle;
        if let Some(loot) = choice.loot {
            sink.emit(Block::system(format!(">> ACQUIRED: {}", loot.name.to_uppercase())));
            self.session.acquire(loot);
        }
        sink.emit(Block::system(format!(
            ">> SELECTED: {}",
            resolver::substitute(&choice.text, &self.session)
        )));

        match choice.target {
            Some(target) => {
                if self.enter_chapter(&target, true, sink) {
                    self.play_current(sink, true)
                } else {
                    Ok(())
                }
            }
            None => {
                self.cursor += 1;
                self.play_current(sink, true)
            }
        }
    }

    /// Undo the most recent checkpoint and re-render the one before it.
    pub fn go_back(&mut self, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        match self.phase {
            Phase::Idle | Phase::AwaitingFreeInput(_) | Phase::AwaitingChoice(_) => {}
            Phase::Revealing(_) => return Err(InterpreterError::Revealing),
            Phase::EndOfChapter => return Err(InterpreterError::InvalidState("at the end of a chapter")),
            Phase::EndOfArchive => return Err(InterpreterError::Finished),
        }

        let popped = self
            .session
            .history
            .pop()
            .ok_or(InterpreterError::NothingToRollBack)?;
        let owned = self.passage_counts.pop().unwrap_or(1);
        retract(sink, owned);

        let target = match self.session.history.last().cloned() {
            Some(previous) => {
                // The previous scene is re-rendered, so its old output goes too.
                let owned = self.passage_counts.last().copied().unwrap_or(1);
                retract(sink, owned);
                self.reset_top_passages();
                previous
            }
            None => popped,
        };
        log::debug!("rolling back to {}:{}", target.chapter_id, target.scene_index);

        self.phase = Phase::Idle;
        if target.chapter_id != self.chapter_id && !self.enter_chapter(&target.chapter_id, false, sink) {
            return Ok(());
        }
        self.cursor = target.scene_index;
        self.citations_shown = false;
        self.play_current(sink, false)
    }

    /// Options for the pending choice, with availability for the player.
    pub fn choice_options(&self) -> Vec<ChoiceOption> {
        match &self.phase {
            Phase::AwaitingChoice(choices) => self.options_for(choices),
            _ => Vec::new(),
        }
    }

    // ----------------------------------------------------------------------
    // Scene machinery
    // ----------------------------------------------------------------------

    fn current_chapter(&self) -> Option<&Chapter> {
        self.story.chapter(&self.chapter_id)
    }

    /// Render the scene at the cursor, skipping scenes gated to the other
    /// mode. With `record`, the scene's checkpoint goes onto the history.
    fn play_current(&mut self, sink: &mut dyn OutputSink, record: bool) -> Result<(), InterpreterError> {
        let mode = self.session.mode;
        let scene = loop {
            let Some(chapter) = self.current_chapter() else {
                self.end_of_archive(sink);
                return Ok(());
            };
            let Some(scene) = chapter.scenes.get(self.cursor) else {
                return self.finish_chapter(sink);
            };
            if scene.visible_in(mode) {
                break scene.clone();
            }
            log::trace!(
                "scene {}:{} hidden in {:?} mode",
                self.chapter_id,
                self.cursor,
                mode
            );
            self.cursor += 1;
        };

        self.persistence.save(&self.session, &self.chapter_id, self.cursor);
        if record {
            self.session.history.push(self.checkpoint());
            self.passage_counts.push(0);
            let excess = self
                .passage_counts
                .len()
                .saturating_sub(self.session.history.len());
            self.passage_counts.drain(..excess);
        }

        let text = resolver::resolve_or_fallback(
            &scene.variants,
            scene.focus,
            &self.session,
            &self.config.fallback_text,
        );
        let style = style_for(scene.focus);
        match scene.kind {
            SceneKind::Text { image, fx } => {
                self.begin_reveal(sink, &text, style, fx, AfterReveal::TextScene(image))
            }
            SceneKind::Input(kind) => self.begin_reveal(sink, &text, style, None, AfterReveal::InputPrompt(kind)),
            SceneKind::Choice(choices) => {
                self.begin_reveal(sink, &text, style, None, AfterReveal::ChoicePrompt(choices))
            }
        }
    }

    fn begin_reveal(
        &mut self,
        sink: &mut dyn OutputSink,
        text: &str,
        style: StyleTag,
        fx: Option<Fx>,
        after: AfterReveal,
    ) -> Result<(), InterpreterError> {
        self.scheduler
            .begin(sink, text, style, fx, self.config.step_delay(style))?;
        if style.is_passage() {
            if let Some(count) = self.passage_counts.last_mut() {
                *count += 1;
            }
        }
        self.phase = Phase::Revealing(after);
        Ok(())
    }

    fn complete_reveal(&mut self, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        let after = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Revealing(after) => after,
            other => {
                self.phase = other;
                return Ok(());
            }
        };
        match after {
            AfterReveal::TextScene(image) => {
                if let Some(image) = image {
                    sink.emit(Block::Image(image));
                }
                self.cursor += 1;
                Ok(())
            }
            AfterReveal::InputPrompt(kind) => {
                self.phase = Phase::AwaitingFreeInput(kind);
                Ok(())
            }
            AfterReveal::ChoicePrompt(choices) => {
                sink.emit(Block::Choices(self.options_for(&choices)));
                self.phase = Phase::AwaitingChoice(choices);
                Ok(())
            }
            AfterReveal::Continue => self.play_current(sink, true),
        }
    }

    /// The newest history entry is about to be rendered again.
    fn reset_top_passages(&mut self) {
        if let Some(count) = self.passage_counts.last_mut() {
            *count = 0;
        }
    }

    fn options_for(&self, choices: &[Choice]) -> Vec<ChoiceOption> {
        choices
            .iter()
            .enumerate()
            .map(|(index, choice)| ChoiceOption {
                index,
                text: resolver::substitute(&choice.text, &self.session),
                enabled: choice
                    .requirement
                    .map_or(true, |req| self.session.player.stats.get(req.stat) >= req.min_value),
            })
            .collect()
    }

    fn records_bio_input(&self) -> bool {
        self.session.mode == Mode::Solo
            || self
                .config
                .legacy_bio_window
                .map_or(true, |window| self.cursor < window)
    }

    /// Switch to `id`. A fresh entry resets the cursor and shows the header.
    /// Returns false (and ends the archive) when the chapter is missing.
    fn enter_chapter(&mut self, id: &str, fresh: bool, sink: &mut dyn OutputSink) -> bool {
        if self.story.chapter(id).is_none() {
            log::warn!("chapter '{}' not found", id);
            sink.emit(Block::system(">> END OF ARCHIVE."));
            self.phase = Phase::EndOfArchive;
            return false;
        }
        self.chapter_id = id.to_string();
        self.citations_shown = false;
        if fresh {
            self.cursor = 0;
            self.render_chapter_header(sink);
        }
        true
    }

    fn render_chapter_header(&self, sink: &mut dyn OutputSink) {
        let Some(chapter) = self.current_chapter() else {
            return;
        };
        if chapter.telemetry.is_some() {
            sink.emit(Block::Header {
                title: chapter.title.clone(),
                telemetry: chapter.telemetry.clone(),
            });
        }
        if chapter.show_synergy {
            sink.emit(Block::StatCard(StatCard::synergy(
                &self.session.player,
                &self.session.partner,
                self.config.synergy_display_max,
            )));
        }
    }

    /// The cursor ran past the last scene: show citations once, then move on.
    fn finish_chapter(&mut self, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        let sources = match self.current_chapter() {
            Some(chapter) => chapter.sources.clone(),
            None => Vec::new(),
        };
        if !sources.is_empty() && !self.citations_shown {
            sink.emit(Block::Sources(sources));
            self.citations_shown = true;
            self.phase = Phase::EndOfChapter;
            return Ok(());
        }
        self.continue_after_chapter(sink)
    }

    fn continue_after_chapter(&mut self, sink: &mut dyn OutputSink) -> Result<(), InterpreterError> {
        self.citations_shown = false;
        self.phase = Phase::Idle;
        let next = self.current_chapter().and_then(|c| c.next_chapter.clone());
        match next {
            Some(next) => {
                if self.enter_chapter(&next, true, sink) {
                    self.play_current(sink, true)
                } else {
                    Ok(())
                }
            }
            None => {
                log::info!("story complete after '{}'", self.chapter_id);
                sink.emit(Block::system(">> TO BE CONTINUED..."));
                self.phase = Phase::EndOfArchive;
                Ok(())
            }
        }
    }

    fn end_of_archive(&mut self, sink: &mut dyn OutputSink) {
        log::warn!("chapter '{}' not found", self.chapter_id);
        sink.emit(Block::system(">> END OF ARCHIVE."));
        self.phase = Phase::EndOfArchive;
    }
}

fn retract(sink: &mut dyn OutputSink, passages: usize) {
    for _ in 0..passages {
        sink.retract_passage();
    }
}

fn style_for(focus: Focus) -> StyleTag {
    match focus {
        Focus::Ai => StyleTag::Ai,
        Focus::System => StyleTag::System,
        Focus::Player | Focus::Partner => StyleTag::Story,
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("chapter_id", &self.chapter_id)
            .field("cursor", &self.cursor)
            .field("phase", &self.phase)
            .field("history", &self.session.history.len())
            .finish()
    }
}
