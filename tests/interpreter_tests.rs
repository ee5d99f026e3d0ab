/// Interpreter integration tests: play-throughs over the fixture story.

use chronos_engine::core::bio::BioReading;
use chronos_engine::core::config::RuntimeConfig;
use chronos_engine::core::interpreter::{
    Interpreter, InterpreterError, InterpreterState, ResumeOrigin,
};
use chronos_engine::core::output::{Block, StyleTag, Transcript};
use chronos_engine::core::persistence::FileStore;
use chronos_engine::schema::profile::{BackgroundCatalog, BioField, Profile, Stat};
use chronos_engine::schema::session::{Checkpoint, Mode, Session};
use chronos_engine::schema::story::{Focus, Story, StoryError};
use std::path::Path;
use std::time::Duration;

const STORY: &str = "tests/fixtures/story.ron";
const BACKGROUNDS: &str = "tests/fixtures/backgrounds.ron";

fn catalog() -> BackgroundCatalog {
    BackgroundCatalog::load_from_ron(Path::new(BACKGROUNDS)).unwrap()
}

fn interpreter(sink: &mut Transcript) -> Interpreter {
    Interpreter::builder()
        .story_file(STORY)
        .backgrounds_file(BACKGROUNDS)
        .with_config(RuntimeConfig::instant())
        .build(sink)
        .unwrap()
}

fn engineer(mode: Mode) -> Session {
    let mut player = Profile::new("Ava");
    player.apply_background(catalog().get("engineer").unwrap());
    Session::new(mode, player, Profile::new("Ben"))
}

fn plain(mode: Mode) -> Session {
    Session::new(mode, Profile::new("Ava"), Profile::new("Ben"))
}

/// Finish whatever reveal is in flight (zero-delay config).
fn settle(interp: &mut Interpreter, sink: &mut Transcript) -> InterpreterState {
    interp.tick(sink, Duration::ZERO).unwrap()
}

fn step(interp: &mut Interpreter, sink: &mut Transcript) -> InterpreterState {
    interp.advance(sink).unwrap();
    settle(interp, sink)
}

fn history(interp: &Interpreter) -> Vec<Checkpoint> {
    interp.session().history.iter().cloned().collect()
}

/// Drive a solo session up to the choice scene, answering the origin prompt.
fn play_to_choice(interp: &mut Interpreter, sink: &mut Transcript, session: Session) {
    interp.start(session, sink).unwrap();
    step(interp, sink);
    assert_eq!(step(interp, sink), InterpreterState::AwaitingFreeInput);
    interp.submit(sink, "India").unwrap();
    assert_eq!(settle(interp, sink), InterpreterState::AwaitingChoice);
}

#[test]
fn engineer_background_selects_high_tech_variant() {
    let session = engineer(Mode::Solo);
    assert_eq!(session.player.stats.get(Stat::Tech), 5);
    assert_eq!(session.player.stats.unique_max(), Some(Stat::Tech));

    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(session, &mut sink).unwrap();
    step(&mut interp, &mut sink);
    assert_eq!(sink.passages(), vec!["T"]);

    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    assert_eq!(sink.passages(), vec!["D"]);
}

#[test]
fn solo_session_never_sees_coop_scene() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(engineer(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);

    assert!(!sink.passages().contains(&"Two seats."));
    assert_eq!(history(&interp), vec![Checkpoint::new("intro", 1)]);
}

#[test]
fn coop_session_sees_coop_scene() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(engineer(Mode::Coop), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    step(&mut interp, &mut sink);

    assert_eq!(sink.passages(), vec!["Two seats.", "T"]);
    assert_eq!(
        history(&interp),
        vec![Checkpoint::new("intro", 0), Checkpoint::new("intro", 1)]
    );
}

#[test]
fn start_renders_chapter_header() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    match sink.last() {
        Some(Block::Header { title, telemetry }) => {
            assert_eq!(title, "Intro");
            assert_eq!(telemetry.as_ref().unwrap().loc, "Hangar");
        }
        other => panic!("expected header, got {:?}", other),
    }
}

#[test]
fn rollback_restores_previous_transcript() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(engineer(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    let after_first = sink.blocks().to_vec();

    assert_eq!(step(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    assert_eq!(sink.passages(), vec!["T", "Origin?"]);

    interp.go_back(&mut sink).unwrap();
    assert_eq!(settle(&mut interp, &mut sink), InterpreterState::Idle);
    assert_eq!(sink.blocks(), after_first.as_slice());
    assert_eq!(history(&interp), vec![Checkpoint::new("intro", 1)]);
    assert_eq!(interp.cursor(), 2);

    // With one entry left, the same scene is shown again.
    interp.go_back(&mut sink).unwrap();
    settle(&mut interp, &mut sink);
    assert_eq!(sink.passages(), vec!["T"]);
    assert!(interp.session().history.is_empty());

    assert!(matches!(
        interp.go_back(&mut sink),
        Err(InterpreterError::NothingToRollBack)
    ));
}

#[test]
fn locked_choice_is_a_no_op() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    play_to_choice(&mut interp, &mut sink, plain(Mode::Solo));

    match sink.last() {
        Some(Block::Choices(options)) => {
            assert_eq!(options.len(), 3);
            assert!(!options[0].enabled);
            assert!(options[1].enabled);
        }
        other => panic!("expected choices, got {:?}", other),
    }

    let before = sink.len();
    let err = interp.select(&mut sink, 0).unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::RequirementUnmet {
            stat: Stat::Tech,
            required: 5,
            actual: 2
        }
    ));
    assert_eq!(sink.len(), before);
    assert_eq!(interp.state(), InterpreterState::AwaitingChoice);
    assert_eq!(interp.cursor(), 3);
    assert!(interp.session().inventory.is_empty());
}

#[test]
fn unlocked_choice_grants_loot() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    play_to_choice(&mut interp, &mut sink, engineer(Mode::Solo));

    interp.select(&mut sink, 0).unwrap();
    let lines = sink.system_lines();
    assert!(lines.contains(&">> ACQUIRED: CHIP"));
    assert!(lines.contains(&">> SELECTED: Hack"));
    assert_eq!(interp.session().inventory[0].name, "Chip");

    settle(&mut interp, &mut sink);
    assert_eq!(sink.passages().last(), Some(&"After, Ava drives."));
}

#[test]
fn missing_choice_target_ends_archive() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    play_to_choice(&mut interp, &mut sink, plain(Mode::Solo));

    interp.select(&mut sink, 2).unwrap();
    assert_eq!(interp.state(), InterpreterState::EndOfArchive);
    assert_eq!(sink.system_lines().last(), Some(&">> END OF ARCHIVE."));
    assert!(matches!(interp.advance(&mut sink), Err(InterpreterError::Finished)));
}

#[test]
fn full_run_shows_citations_then_ends() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    play_to_choice(&mut interp, &mut sink, plain(Mode::Solo));
    interp.select(&mut sink, 1).unwrap();
    settle(&mut interp, &mut sink);

    step(&mut interp, &mut sink);
    assert_eq!(interp.chapter_id(), "outro");
    assert_eq!(sink.passages().last(), Some(&"Goodbye Ava."));

    interp.advance(&mut sink).unwrap();
    assert_eq!(interp.state(), InterpreterState::EndOfChapter);
    assert!(matches!(sink.last(), Some(Block::Sources(sources)) if sources[0].title == "Ref"));
    assert!(matches!(
        interp.go_back(&mut sink),
        Err(InterpreterError::InvalidState(_))
    ));

    interp.advance(&mut sink).unwrap();
    assert_eq!(interp.state(), InterpreterState::EndOfArchive);
    assert_eq!(sink.system_lines().last(), Some(&">> TO BE CONTINUED..."));
}

#[test]
fn bio_parser_reaction_is_revealed_before_next_scene() {
    let mut sink = Transcript::new();
    let mut interp = Interpreter::builder()
        .story_file(STORY)
        .with_config(RuntimeConfig::instant())
        .bio_parser(Box::new(|field: BioField, raw: &str| BioReading {
            display_text: Some(raw.to_uppercase()),
            reaction_text: Some(format!("{} logged.", field.name())),
        }))
        .build(&mut sink)
        .unwrap();
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    step(&mut interp, &mut sink);

    interp.submit(&mut sink, "india").unwrap();
    assert_eq!(interp.session().player.origin, "INDIA");
    assert!(sink.system_lines().contains(&">> DATA LOGGED: INDIA"));
    assert_eq!(interp.state(), InterpreterState::Revealing);

    assert_eq!(settle(&mut interp, &mut sink), InterpreterState::Revealing);
    assert!(matches!(
        sink.blocks().iter().rev().nth(1),
        Some(Block::Line { style: StyleTag::Ai, content, .. }) if content == "Origin logged."
    ));
    assert_eq!(settle(&mut interp, &mut sink), InterpreterState::AwaitingChoice);
}

#[test]
fn rollback_after_reaction_retracts_the_reaction_too() {
    let mut story = Story::load(Path::new(STORY)).unwrap();
    story.chapters.get_mut("intro").unwrap().scenes[3].focus = Focus::Player;

    let mut sink = Transcript::new();
    let mut interp = Interpreter::builder()
        .with_story(story)
        .with_config(RuntimeConfig::instant())
        .bio_parser(Box::new(|_: BioField, _: &str| BioReading {
            display_text: None,
            reaction_text: Some("Noted.".to_string()),
        }))
        .build(&mut sink)
        .unwrap();
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    step(&mut interp, &mut sink);
    interp.submit(&mut sink, "Peru").unwrap();
    while interp.is_revealing() {
        settle(&mut interp, &mut sink);
    }
    assert_eq!(sink.passages(), vec!["D", "Origin?", "Noted.", "Choose."]);

    interp.go_back(&mut sink).unwrap();
    assert_eq!(settle(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    assert_eq!(sink.passages(), vec!["D", "Origin?"]);
    assert_eq!(
        history(&interp),
        vec![Checkpoint::new("intro", 1), Checkpoint::new("intro", 2)]
    );

    // The prompt now owns a single passage again.
    interp.go_back(&mut sink).unwrap();
    settle(&mut interp, &mut sink);
    assert_eq!(sink.passages(), vec!["D"]);
}

#[test]
fn coop_bio_answers_outside_window_are_not_recorded() {
    let config = RuntimeConfig {
        legacy_bio_window: Some(2),
        ..RuntimeConfig::instant()
    };
    let mut sink = Transcript::new();
    let mut interp = Interpreter::builder()
        .story_file(STORY)
        .with_config(config)
        .build(&mut sink)
        .unwrap();
    interp.start(plain(Mode::Coop), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    step(&mut interp, &mut sink);
    assert_eq!(step(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    assert_eq!(interp.cursor(), 2);

    interp.submit(&mut sink, "Peru").unwrap();
    assert_eq!(interp.session().player.origin, "");
    assert!(sink.system_lines().contains(&">> DATA LOGGED: PERU"));
}

#[test]
fn empty_input_is_rejected_without_state_change() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    step(&mut interp, &mut sink);

    let before = sink.len();
    assert!(matches!(
        interp.submit(&mut sink, "  "),
        Err(InterpreterError::EmptyInput)
    ));
    assert_eq!(sink.len(), before);
    assert_eq!(interp.state(), InterpreterState::AwaitingFreeInput);
    assert!(matches!(
        interp.select(&mut sink, 0),
        Err(InterpreterError::NotAwaitingChoice)
    ));
}

#[test]
fn skip_matches_natural_reveal_and_is_idempotent() {
    let story = Story::parse_ron(
        r#"Story(chapters: {"prologue": Chapter(scenes: [
            Scene(text_blocks: [(condition: "default", text: "Hello **there**.")]),
        ])})"#,
    )
    .unwrap();
    let build = |sink: &mut Transcript| {
        Interpreter::builder()
            .with_story(story.clone())
            .build(sink)
            .unwrap()
    };

    let mut natural_sink = Transcript::new();
    let mut natural = build(&mut natural_sink);
    natural.start(plain(Mode::Solo), &mut natural_sink).unwrap();
    natural.advance(&mut natural_sink).unwrap();
    let state = natural
        .tick(&mut natural_sink, Duration::from_secs(1))
        .unwrap();
    assert_eq!(state, InterpreterState::Idle);

    let mut sink = Transcript::new();
    let mut interp = build(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    interp.advance(&mut sink).unwrap();
    interp.tick(&mut sink, Duration::from_millis(75)).unwrap();
    assert_eq!(sink.passages(), vec!["Hel"]);
    assert!(matches!(interp.advance(&mut sink), Err(InterpreterError::Revealing)));

    assert_eq!(interp.request_skip(&mut sink).unwrap(), InterpreterState::Idle);
    let after_skip = sink.len();
    assert_eq!(interp.request_skip(&mut sink).unwrap(), InterpreterState::Idle);
    assert_eq!(sink.len(), after_skip);

    assert_eq!(sink.blocks(), natural_sink.blocks());
    assert_eq!(sink.passages(), vec!["Hello <strong>there</strong>."]);
}

#[test]
fn save_and_resume_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let mut sink = Transcript::new();
    let mut interp = Interpreter::builder()
        .story_file(STORY)
        .with_config(RuntimeConfig::instant())
        .store(Box::new(FileStore::new(dir.path())))
        .build(&mut sink)
        .unwrap();
    play_to_choice(&mut interp, &mut sink, engineer(Mode::Solo));
    assert!(interp.has_save());

    let mut resumed_sink = Transcript::new();
    let mut resumed = Interpreter::builder()
        .story_file(STORY)
        .with_config(RuntimeConfig::instant())
        .store(Box::new(FileStore::new(dir.path())))
        .build(&mut resumed_sink)
        .unwrap();
    assert!(resumed
        .resume_saved(ResumeOrigin::InPlace, &mut resumed_sink)
        .unwrap());
    assert_eq!(resumed_sink.system_lines()[0], "RESTORING TIMELINE...");
    assert!(!resumed_sink
        .blocks()
        .iter()
        .any(|b| matches!(b, Block::Header { .. })));

    assert_eq!(
        settle(&mut resumed, &mut resumed_sink),
        InterpreterState::AwaitingChoice
    );
    assert_eq!(resumed.chapter_id(), "intro");
    assert_eq!(resumed.cursor(), 3);
    assert_eq!(resumed.session(), interp.session());
    assert_eq!(resumed.session().player.origin, "India");
}

#[test]
fn resume_from_main_menu_shows_header() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    play_to_choice(&mut interp, &mut sink, plain(Mode::Solo));
    let snapshot = interp.persistence().load().unwrap();

    let mut fresh_sink = Transcript::new();
    let mut fresh = interpreter(&mut fresh_sink);
    fresh
        .resume(snapshot, ResumeOrigin::MainMenu, &mut fresh_sink)
        .unwrap();
    assert!(matches!(fresh_sink.blocks()[1], Block::Header { .. }));
}

#[test]
fn wipe_discards_save() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    step(&mut interp, &mut sink);
    assert!(interp.has_save());

    interp.wipe().unwrap();
    assert!(!interp.has_save());
    assert!(interp.session().history.is_empty());
    assert!(!interp.resume_saved(ResumeOrigin::MainMenu, &mut sink).unwrap());
}

#[test]
fn wipe_mid_reveal_is_refused_and_keeps_save() {
    let mut sink = Transcript::new();
    let mut interp = interpreter(&mut sink);
    interp.start(plain(Mode::Solo), &mut sink).unwrap();
    interp.advance(&mut sink).unwrap();
    assert!(interp.is_revealing());

    assert!(matches!(interp.wipe(), Err(InterpreterError::Revealing)));
    assert!(interp.has_save());
    assert_eq!(interp.session().history.len(), 1);
}

#[test]
fn unreadable_story_is_reported() {
    let mut sink = Transcript::new();
    let result = Interpreter::builder()
        .story_file("tests/fixtures/does_not_exist.ron")
        .build(&mut sink);
    assert!(matches!(result, Err(InterpreterError::Story(_))));
    assert!(sink.system_lines()[0].starts_with("CRITICAL ERROR"));
}

#[test]
fn missing_start_chapter_is_fatal() {
    let story = Story::parse_ron("#![enable(implicit_some)]\nStory(start: \"zero\", chapters: {})").unwrap();
    let mut sink = Transcript::new();
    let result = Interpreter::builder().with_story(story).build(&mut sink);
    assert!(matches!(
        result,
        Err(InterpreterError::Story(StoryError::MissingStart(ref id))) if id == "zero"
    ));
    assert_eq!(sink.system_lines().len(), 1);
    assert!(sink.system_lines()[0].starts_with("CRITICAL ERROR"));
}
