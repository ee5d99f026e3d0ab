//! WASM bindings for chronos-engine, powering the browser build.
//!
//! Every command returns a JSON [`Frame`]: the interpreter state plus the
//! whole transcript, which the page re-renders. The browser drives reveals
//! by calling `tick` from `requestAnimationFrame`.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use chronos_engine::core::config::RuntimeConfig;
use chronos_engine::core::interpreter::{Interpreter, InterpreterState, ResumeOrigin};
use chronos_engine::core::output::{Block, OutputSink, StatCard, Transcript};
use chronos_engine::schema::profile::{BackgroundCatalog, Profile};
use chronos_engine::schema::session::{Mode, Session};
use chronos_engine::schema::story::Story;

// ---------------------------------------------------------------------------
// Embedded story data, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const STORY: &str = include_str!("../../story_data/chronos/story.ron");
    pub const BACKGROUNDS: &str = include_str!("../../story_data/chronos/backgrounds.ron");
    pub const CONFIG: &str = include_str!("../../story_data/chronos/config.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Deserialize)]
struct NewGameInput {
    mode: String,
    player_name: String,
    /// 1-based background menu answer.
    player_background: String,
    partner_name: Option<String>,
    partner_background: Option<String>,
}

#[derive(serde::Serialize)]
struct Frame<'a> {
    state: InterpreterState,
    chapter: &'a str,
    blocks: &'a [Block],
}

#[derive(serde::Serialize)]
struct BackgroundInfo<'a> {
    index: usize,
    id: &'a str,
    name: &'a str,
    desc: &'a str,
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn pick_background(
    catalog: &BackgroundCatalog,
    profile: &mut Profile,
    answer: &str,
    sink: &mut dyn OutputSink,
    max: i32,
) -> Result<(), JsError> {
    let background = catalog
        .select(answer)
        .ok_or_else(|| JsError::new(&format!("Unknown background choice: {answer}")))?;
    profile.apply_background(background);
    sink.emit(Block::StatCard(StatCard::for_profile(
        profile,
        &background.name,
        max,
    )));
    Ok(())
}

// ---------------------------------------------------------------------------
// ChronosDemo: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct ChronosDemo {
    interpreter: Interpreter,
    transcript: Transcript,
}

#[wasm_bindgen]
impl ChronosDemo {
    /// Load the embedded story. Saves live in memory for the page lifetime;
    /// the page mirrors them to localStorage via `snapshot`/`restore`.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ChronosDemo, JsError> {
        let story = Story::parse_ron(data::STORY).map_err(|e| js_err("Story parse error", e))?;
        let catalog = BackgroundCatalog::parse_ron(data::BACKGROUNDS)
            .map_err(|e| js_err("Background parse error", e))?;
        let config =
            RuntimeConfig::parse_ron(data::CONFIG).map_err(|e| js_err("Config parse error", e))?;

        let mut transcript = Transcript::new();
        let interpreter = Interpreter::builder()
            .with_story(story)
            .with_backgrounds(catalog)
            .with_config(config)
            .build(&mut transcript)
            .map_err(|e| js_err("Interpreter build error", e))?;

        Ok(ChronosDemo {
            interpreter,
            transcript,
        })
    }

    /// Background menu as a JSON array.
    pub fn backgrounds(&self) -> String {
        let info: Vec<BackgroundInfo> = self
            .interpreter
            .catalog()
            .backgrounds
            .iter()
            .enumerate()
            .map(|(i, b)| BackgroundInfo {
                index: i + 1,
                id: &b.id,
                name: &b.name,
                desc: &b.desc,
            })
            .collect();
        serde_json::to_string(&info).unwrap_or_else(|_| "[]".to_string())
    }

    /// Start a new game from a JSON description of the participants.
    ///
    /// ```json
    /// { "mode": "coop", "player_name": "Lava", "player_background": "1",
    ///   "partner_name": "Beeth", "partner_background": "3" }
    /// ```
    pub fn new_game(&mut self, input_json: &str) -> Result<String, JsError> {
        let input: NewGameInput = serde_json::from_str(input_json)
            .map_err(|e| js_err("Invalid new game JSON", e))?;
        let mode = Mode::parse(&input.mode)
            .ok_or_else(|| JsError::new(&format!("Unknown mode: {}", input.mode)))?;

        self.interpreter.wipe().map_err(|e| js_err("Reset error", e))?;
        self.transcript.clear();

        let catalog = self.interpreter.catalog().clone();
        let max = self.interpreter.config().stat_display_max;

        let mut player = Profile::new(input.player_name);
        pick_background(
            &catalog,
            &mut player,
            &input.player_background,
            &mut self.transcript,
            max,
        )?;

        let partner = match (mode, input.partner_name) {
            (Mode::Coop, Some(name)) => {
                let mut partner = Profile::new(name);
                if let Some(answer) = input.partner_background {
                    pick_background(&catalog, &mut partner, &answer, &mut self.transcript, max)?;
                }
                partner
            }
            _ => Profile::auto_partner(),
        };

        self.interpreter
            .start(Session::new(mode, player, partner), &mut self.transcript)
            .map_err(|e| js_err("Start error", e))?;
        Ok(self.frame())
    }

    pub fn advance(&mut self) -> Result<String, JsError> {
        self.interpreter
            .advance(&mut self.transcript)
            .map_err(|e| js_err("Advance error", e))?;
        Ok(self.frame())
    }

    /// Called once per animation frame with the milliseconds since the last.
    pub fn tick(&mut self, elapsed_ms: f64) -> Result<String, JsError> {
        let elapsed = Duration::from_secs_f64(elapsed_ms.max(0.0) / 1000.0);
        self.interpreter
            .tick(&mut self.transcript, elapsed)
            .map_err(|e| js_err("Tick error", e))?;
        Ok(self.frame())
    }

    pub fn skip(&mut self) -> Result<String, JsError> {
        self.interpreter
            .request_skip(&mut self.transcript)
            .map_err(|e| js_err("Skip error", e))?;
        Ok(self.frame())
    }

    pub fn submit(&mut self, value: &str) -> Result<String, JsError> {
        self.interpreter
            .submit(&mut self.transcript, value)
            .map_err(|e| js_err("Input rejected", e))?;
        Ok(self.frame())
    }

    /// Pick a choice by its zero-based index.
    pub fn select(&mut self, index: usize) -> Result<String, JsError> {
        self.interpreter
            .select(&mut self.transcript, index)
            .map_err(|e| js_err("Choice rejected", e))?;
        Ok(self.frame())
    }

    pub fn go_back(&mut self) -> Result<String, JsError> {
        self.interpreter
            .go_back(&mut self.transcript)
            .map_err(|e| js_err("Rollback error", e))?;
        Ok(self.frame())
    }

    /// Current save as JSON, for the page to persist.
    pub fn snapshot(&self) -> Option<String> {
        let snapshot = self.interpreter.persistence().load()?;
        serde_json::to_string(&snapshot).ok()
    }

    /// Resume from a save previously returned by `snapshot`.
    pub fn restore(&mut self, snapshot_json: &str) -> Result<String, JsError> {
        let snapshot = serde_json::from_str(snapshot_json)
            .map_err(|e| js_err("Invalid save", e))?;
        self.transcript.clear();
        self.interpreter
            .resume(snapshot, ResumeOrigin::MainMenu, &mut self.transcript)
            .map_err(|e| js_err("Resume error", e))?;
        Ok(self.frame())
    }

    pub fn state(&self) -> String {
        self.frame()
    }
}

impl ChronosDemo {
    fn frame(&self) -> String {
        let frame = Frame {
            state: self.interpreter.state(),
            chapter: self.interpreter.chapter_id(),
            blocks: self.transcript.blocks(),
        };
        serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string())
    }
}
