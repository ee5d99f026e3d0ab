/// Play: terminal front end for the chronos interpreter.
///
/// Usage: play [--story <path>] [--backgrounds <path>] [--config <path>]
///             [--save-dir <dir>] [--coop] [--instant]
///
/// At the prompt:
///   <enter>      continue
///   <n>          pick choice n
///   <text>       answer a question
///   back         roll back one scene
///   stats        show the player's stat card
///   inventory    list acquired items
///   wipe         delete the save and quit
///   quit         exit (progress is autosaved)

use chronos_engine::core::bio::BioReading;
use chronos_engine::core::config::RuntimeConfig;
use chronos_engine::core::interpreter::{Interpreter, InterpreterState, ResumeOrigin};
use chronos_engine::core::markup;
use chronos_engine::core::output::{Block, OutputSink, StatCard, StyleTag};
use chronos_engine::core::persistence::FileStore;
use chronos_engine::schema::profile::{BackgroundCatalog, BioField, Profile};
use chronos_engine::schema::session::{Mode, Session};
use chronos_engine::schema::story::Fx;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut story_path = "story_data/chronos/story.ron".to_string();
    let mut backgrounds_path = "story_data/chronos/backgrounds.ron".to_string();
    let mut config_path = None;
    let mut save_dir = ".chronos".to_string();
    let mut coop = false;
    let mut instant = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--story" if i + 1 < args.len() => {
                i += 1;
                story_path = args[i].clone();
            }
            "--backgrounds" if i + 1 < args.len() => {
                i += 1;
                backgrounds_path = args[i].clone();
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--save-dir" if i + 1 < args.len() => {
                i += 1;
                save_dir = args[i].clone();
            }
            "--coop" => coop = true,
            "--instant" => instant = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut sink = Terminal::default();
    let mut builder = Interpreter::builder()
        .story_file(&story_path)
        .backgrounds_file(&backgrounds_path)
        .store(Box::new(FileStore::new(&save_dir)))
        .bio_parser(Box::new(classify_bio));
    if let Some(ref path) = config_path {
        builder = builder.config_file(path);
    }
    if instant {
        let mut config = match config_path {
            Some(ref path) => {
                match RuntimeConfig::load(Path::new(path)) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("ERROR: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            None => RuntimeConfig::default(),
        };
        config.story_speed_ms = 0;
        config.ai_speed_ms = 0;
        builder = builder.with_config(config);
    }
    let mut interp = match builder.build(&mut sink) {
        Ok(interp) => interp,
        Err(_) => std::process::exit(1),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let resumed = interp.has_save()
        && prompt(&mut lines, "Saved timeline found. Resume? [Y/n] ")
            .map_or(false, |a| !a.eq_ignore_ascii_case("n"))
        && interp
            .resume_saved(ResumeOrigin::MainMenu, &mut sink)
            .unwrap_or(false);

    if !resumed {
        let Some(session) = create_session(&mut lines, interp.catalog(), coop, &mut sink, interp.config().stat_display_max)
        else {
            return;
        };
        if let Err(e) = interp.start(session, &mut sink) {
            eprintln!("ERROR: {}", e);
            return;
        }
    }

    loop {
        run_reveal(&mut interp, &mut sink);

        let label = match interp.state() {
            InterpreterState::AwaitingChoice => "choose> ",
            InterpreterState::AwaitingFreeInput => "answer> ",
            InterpreterState::EndOfArchive => {
                println!();
                break;
            }
            _ => "> ",
        };
        let Some(line) = prompt(&mut lines, label) else {
            break;
        };

        let result = match line.as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                print_usage();
                continue;
            }
            "back" => interp.go_back(&mut sink),
            "stats" => {
                let player = &interp.session().player;
                let name = interp
                    .catalog()
                    .get(&player.background_id)
                    .map_or("Unassigned", |b| b.name.as_str());
                sink.emit(Block::StatCard(StatCard::for_profile(
                    player,
                    name,
                    interp.config().stat_display_max,
                )));
                continue;
            }
            "inventory" => {
                for item in &interp.session().inventory {
                    println!("  * {}: {}", item.name, item.desc);
                }
                continue;
            }
            "wipe" => match interp.wipe() {
                Ok(()) => {
                    println!("Timeline erased.");
                    break;
                }
                Err(e) => Err(e),
            },
            _ => match interp.state() {
                InterpreterState::AwaitingChoice => match line.parse::<usize>() {
                    Ok(n) if n >= 1 => interp.select(&mut sink, n - 1),
                    _ => {
                        println!("Enter a choice number.");
                        continue;
                    }
                },
                InterpreterState::AwaitingFreeInput => interp.submit(&mut sink, &line),
                _ => interp.advance(&mut sink),
            },
        };

        if let Err(e) = result {
            println!("[{}]", e);
        }
    }
}

/// Let the current reveal play out in real time.
fn run_reveal(interp: &mut Interpreter, sink: &mut Terminal) {
    let mut last = Instant::now();
    while interp.is_revealing() {
        std::thread::sleep(FRAME);
        let now = Instant::now();
        if let Err(e) = interp.tick(sink, now - last) {
            println!("[{}]", e);
            return;
        }
        last = now;
    }
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Option<String> {
    print!("{}", label);
    io::stdout().flush().ok();
    lines.next()?.ok().map(|l| l.trim().to_string())
}

fn create_session(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    catalog: &BackgroundCatalog,
    coop: bool,
    sink: &mut Terminal,
    max: i32,
) -> Option<Session> {
    let mut player = Profile::new(prompt(lines, "Your name: ")?);
    choose_background(lines, catalog, &mut player, sink, max)?;

    let (mode, partner) = if coop {
        let mut partner = Profile::new(prompt(lines, "Partner's name: ")?);
        choose_background(lines, catalog, &mut partner, sink, max)?;
        (Mode::Coop, partner)
    } else {
        (Mode::Solo, Profile::auto_partner())
    };
    Some(Session::new(mode, player, partner))
}

fn choose_background(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    catalog: &BackgroundCatalog,
    profile: &mut Profile,
    sink: &mut Terminal,
    max: i32,
) -> Option<()> {
    if catalog.is_empty() {
        return Some(());
    }
    for (i, b) in catalog.backgrounds.iter().enumerate() {
        println!("  [{}] {}: {}", i + 1, b.name, b.desc);
    }
    loop {
        let answer = prompt(lines, "Background: ")?;
        if let Some(background) = catalog.select(&answer) {
            profile.apply_background(background);
            sink.emit(Block::StatCard(StatCard::for_profile(
                profile,
                &background.name,
                max,
            )));
            return Some(());
        }
        println!("Invalid selection.");
    }
}

/// Normalise biographical answers and pick a reaction line.
fn classify_bio(field: BioField, raw: &str) -> BioReading {
    let lower = raw.to_lowercase();
    match field {
        BioField::Age => {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            let Ok(number) = digits.parse::<i32>() else {
                return BioReading::default();
            };
            let current_year = chrono::Datelike::year(&chrono::Utc::now());
            let age = if number > 1900 && number <= current_year {
                current_year - number
            } else {
                number
            };
            let reaction = if age < 18 {
                "A bit young for a temporal paradox, aren't we?"
            } else if age > 60 {
                "Experience. We need wisdom where we are going."
            } else {
                "Prime condition. Let's see if you can keep up with *me*."
            };
            BioReading {
                display_text: Some(age.to_string()),
                reaction_text: Some(reaction.to_string()),
            }
        }
        BioField::Origin if lower.contains("india") || lower.contains("bharat") => BioReading {
            display_text: None,
            reaction_text: Some("India? Loading Sanskrit linguistic subroutines.".to_string()),
        },
        BioField::Origin if lower.contains("usa") || lower.contains("america") => BioReading {
            display_text: None,
            reaction_text: Some("Copy that. We use Metric in this timeline.".to_string()),
        },
        _ => BioReading::default(),
    }
}

/// Prints blocks to stdout, stripping markup.
#[derive(Default)]
struct Terminal {
    /// Plain text already printed for the open line.
    printed: String,
}

impl Terminal {
    fn plain(fragment: &str) -> String {
        markup::plain_text(&markup::parse(fragment))
    }
}

impl OutputSink for Terminal {
    fn emit(&mut self, block: Block) {
        match block {
            Block::Line { content, .. } => println!("{}", Self::plain(&content)),
            Block::Header { title, telemetry } => {
                println!("\n=== {} ===", title.to_uppercase());
                if let Some(t) = telemetry {
                    println!("LOC: {}  |  TIME: {}", t.loc, t.time);
                }
            }
            Block::StatCard(card) => {
                println!("\n[{}] {}", card.title, card.subtitle);
                for row in card.rows {
                    let filled = (row.percent / 10) as usize;
                    println!(
                        "  {:<7}{}{} {}/{}",
                        row.stat.name(),
                        "#".repeat(filled),
                        ".".repeat(10 - filled),
                        row.value,
                        row.max
                    );
                }
            }
            Block::Image(image) => {
                println!("[image: {}]", image.src);
                if let Some(caption) = image.caption {
                    println!("  {}", caption);
                }
            }
            Block::Choices(options) => {
                for option in options {
                    let lock = if option.enabled { "" } else { " [LOCKED]" };
                    println!("  {}) {}{}", option.index + 1, option.text, lock);
                }
            }
            Block::Sources(sources) => {
                println!("\nSOURCES:");
                for source in sources {
                    println!("  - {} <{}>", source.title, source.link);
                }
            }
        }
    }

    fn open_line(&mut self, style: StyleTag, fx: Option<Fx>) {
        self.printed.clear();
        if fx == Some(Fx::Shake) {
            println!("~~~");
        }
        match style {
            StyleTag::Ai => print!("SMYLYNX: "),
            StyleTag::System => print!(">> "),
            StyleTag::Story => {}
        }
        io::stdout().flush().ok();
    }

    fn append(&mut self, fragment: &str) {
        let text = Self::plain(fragment);
        print!("{}", text);
        io::stdout().flush().ok();
        self.printed.push_str(&text);
    }

    fn set_line(&mut self, content: &str) {
        let full = Self::plain(content);
        match full.strip_prefix(self.printed.as_str()) {
            Some(rest) => print!("{}", rest),
            None => print!("\n{}", full),
        }
        io::stdout().flush().ok();
        self.printed = full;
    }

    fn close_line(&mut self) {
        println!();
        self.printed.clear();
    }

    fn retract_passage(&mut self) {
        println!("\n<< REWINDING >>");
    }
}

fn print_usage() {
    println!("Usage: play [--story <path>] [--backgrounds <path>] [--config <path>]");
    println!("            [--save-dir <dir>] [--coop] [--instant]");
    println!();
    println!("  <enter>    continue");
    println!("  <n>        pick choice n");
    println!("  <text>     answer a question");
    println!("  back       roll back one scene");
    println!("  stats      show your stat card");
    println!("  inventory  list acquired items");
    println!("  wipe       delete the save and quit");
    println!("  quit       exit (progress is autosaved)");
}
