/// Story data integration tests: bundled archive loading, linting, and a
/// full coop play-through.

use chronos_engine::core::interpreter::{Interpreter, InterpreterState};
use chronos_engine::core::lint::lint_story;
use chronos_engine::core::output::{Block, Transcript};
use chronos_engine::schema::profile::{BackgroundCatalog, Profile, Stat};
use chronos_engine::schema::session::{Mode, Session};
use chronos_engine::schema::story::{Focus, InputKind, SceneKind, Story};
use std::path::Path;
use std::time::Duration;

const STORY: &str = "story_data/chronos/story.ron";
const BACKGROUNDS: &str = "story_data/chronos/backgrounds.ron";
const CONFIG: &str = "story_data/chronos/config.ron";

#[test]
fn bundled_story_loads() {
    let story = Story::load(Path::new(STORY)).unwrap();
    assert_eq!(story.start, "prologue");
    assert_eq!(story.chapters.len(), 2);

    let prologue = story.chapter("prologue").unwrap();
    assert_eq!(prologue.next_chapter.as_deref(), Some("chapter_1"));
    assert_eq!(prologue.scenes[0].focus, Focus::Ai);
    assert_eq!(
        prologue.scenes[4].kind,
        SceneKind::Input(InputKind::RoleDesignation("designate_passenger".to_string()))
    );

    let chapter_1 = story.chapter("chapter_1").unwrap();
    assert!(chapter_1.show_synergy);
    assert_eq!(chapter_1.sources.len(), 1);
}

#[test]
fn bundled_story_lints_clean() {
    let story = Story::load(Path::new(STORY)).unwrap();
    let catalog = BackgroundCatalog::load(Path::new(BACKGROUNDS)).unwrap();
    let report = lint_story(&story, &catalog);
    assert!(report.is_clean(), "{:#?}", report);
}

#[test]
fn fixture_story_lint_finds_dangling_target() {
    let story = Story::load(Path::new("tests/fixtures/story.ron")).unwrap();
    let catalog = BackgroundCatalog::load(Path::new("tests/fixtures/backgrounds.ron")).unwrap();
    let report = lint_story(&story, &catalog);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("'void'"));
}

#[test]
fn json_story_format_is_accepted() {
    let json = r#"{
        "start": "prologue",
        "chapters": {
            "prologue": {
                "title": "P",
                "telemetry": {"loc": "Lab", "time": "Now"},
                "scenes": [
                    {"text_blocks": [{"condition": "default", "text": "Hi {player}"}]},
                    {
                        "focus": "system",
                        "text_blocks": [{"condition": "default", "text": "Go?"}],
                        "choices": [
                            {"text": "Yes", "req": {"stat": "tech", "val": 3}, "loot": {"name": "Key"}},
                            {"text": "No", "target": "prologue"}
                        ]
                    }
                ]
            }
        }
    }"#;
    let story = Story::parse_json(json).unwrap();
    let scene = &story.chapter("prologue").unwrap().scenes[1];
    match &scene.kind {
        SceneKind::Choice(choices) => {
            let req = choices[0].requirement.unwrap();
            assert_eq!(req.stat, Stat::Tech);
            assert_eq!(req.min_value, 3);
            assert_eq!(choices[0].loot.as_ref().unwrap().desc, "");
            assert_eq!(choices[1].target.as_deref(), Some("prologue"));
        }
        other => panic!("expected choice scene, got {:?}", other),
    }
}

#[test]
fn scene_with_input_and_choices_is_rejected() {
    let ron_src = r#"#![enable(implicit_some)]
Story(chapters: {"prologue": Chapter(scenes: [
    Scene(text_blocks: [(condition: "default", text: "?")], input_prompt: "age", choices: [(text: "x")]),
])})"#;
    assert!(Story::parse_ron(ron_src).is_err());
}

/// Let the running reveal play out in half-second frames.
fn finish(interp: &mut Interpreter, sink: &mut Transcript) -> InterpreterState {
    while interp.is_revealing() {
        interp.tick(sink, Duration::from_millis(500)).unwrap();
    }
    interp.state()
}

#[test]
fn coop_play_through_of_bundled_story() {
    let mut sink = Transcript::new();
    let mut interp = Interpreter::builder()
        .story_file(STORY)
        .backgrounds_file(BACKGROUNDS)
        .config_file(CONFIG)
        .build(&mut sink)
        .unwrap();
    assert_eq!(interp.config().ai_speed_ms, 40);

    let catalog = interp.catalog().clone();
    let mut player = Profile::new("Lava");
    player.apply_background(catalog.select("1").unwrap());
    let mut partner = Profile::new("Beeth");
    partner.apply_background(catalog.select("3").unwrap());

    interp
        .start(Session::new(Mode::Coop, player, partner), &mut sink)
        .unwrap();

    interp.advance(&mut sink).unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::Idle);

    interp.advance(&mut sink).unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    interp.submit(&mut sink, "30").unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    interp.submit(&mut sink, "India").unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::Idle);
    assert_eq!(sink.passages().last(), Some(&"Beeth climbs into the second seat. Two seats, one wheel."));

    interp.advance(&mut sink).unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::AwaitingFreeInput);
    interp.submit(&mut sink, "beeth rides").unwrap();
    assert!(sink.system_lines().contains(&">> DRIVER DESIGNATED: LAVA"));
    assert_eq!(interp.session().passenger, "Beeth");

    finish(&mut interp, &mut sink);
    assert_eq!(
        sink.passages().last(),
        Some(&"You read the reactor output at a glance. <strong>Stable.</strong> For now.")
    );
    assert!(matches!(sink.last(), Some(Block::Image(image)) if image.src == "img/hangar.jpg"));

    let player = &interp.session().player;
    assert_eq!(player.age, "30");
    assert_eq!(player.origin, "India");

    // Chapter 1 opens with its header and the team synergy card.
    let mark = sink.len();
    interp.advance(&mut sink).unwrap();
    assert!(matches!(sink.since(mark)[0], Block::Header { .. }));
    match &sink.since(mark)[1] {
        Block::StatCard(card) => {
            assert_eq!(card.title, "TEAM SYNERGY");
            assert_eq!(card.rows[0].value, 5 + 2);
            assert_eq!(card.rows[0].max, 20);
        }
        other => panic!("expected synergy card, got {:?}", other),
    }
    finish(&mut interp, &mut sink);
    assert_eq!(sink.passages().last(), Some(&"Smoke drifts between the shelves."));

    interp.advance(&mut sink).unwrap();
    finish(&mut interp, &mut sink);
    assert_eq!(sink.passages().last(), Some(&"Beeth checks the scholars for burns."));

    interp.advance(&mut sink).unwrap();
    assert_eq!(finish(&mut interp, &mut sink), InterpreterState::AwaitingChoice);
    interp.select(&mut sink, 0).unwrap();
    assert_eq!(interp.session().inventory[0].name, "Anchor Coil");
    finish(&mut interp, &mut sink);
    assert_eq!(
        sink.passages().last(),
        Some(&"Jump window closing. Hold on, Beeth.")
    );

    interp.advance(&mut sink).unwrap();
    assert_eq!(interp.state(), InterpreterState::EndOfChapter);
    interp.advance(&mut sink).unwrap();
    assert_eq!(interp.state(), InterpreterState::EndOfArchive);
}
