/// Story Linter: validates chapter links, variant coverage and stat gates.
///
/// Usage: story_linter <story_file_or_dir> [--backgrounds <file>]

use chronos_engine::core::lint::lint_story;
use chronos_engine::schema::profile::BackgroundCatalog;
use chronos_engine::schema::story::Story;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story_file_or_dir> [--backgrounds <file>]");
        process::exit(0);
    }

    let story_arg = &args[1];
    let mut backgrounds_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--backgrounds" && i + 1 < args.len() {
            i += 1;
            backgrounds_path = Some(args[i].clone());
        }
        i += 1;
    }

    let story_path = Path::new(story_arg);
    let mut story: Option<Story> = None;

    if story_path.is_file() {
        match Story::load(story_path) {
            Ok(s) => story = Some(s),
            Err(e) => {
                eprintln!("ERROR: Failed to load story file: {}", e);
                process::exit(1);
            }
        }
    } else if story_path.is_dir() {
        load_stories_recursive(story_path, &mut story);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", story_arg);
        process::exit(1);
    }

    let Some(story) = story else {
        eprintln!("ERROR: No story files found under '{}'", story_arg);
        process::exit(1);
    };

    let catalog = match backgrounds_path {
        Some(ref path) => match BackgroundCatalog::load(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to load backgrounds: {}", e);
                process::exit(1);
            }
        },
        None => BackgroundCatalog::default(),
    };

    let scenes: usize = story.chapters.values().map(|c| c.scenes.len()).sum();
    println!(
        "Loaded {} chapters ({} scenes), {} backgrounds",
        story.chapters.len(),
        scenes,
        catalog.len()
    );

    let report = lint_story(&story, &catalog);

    println!("\n=== Story Lint Report ===\n");

    if report.is_clean() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    process::exit(if report.errors.is_empty() { 0 } else { 1 });
}

/// Merge every `.ron` / `.json` story under `dir`. The first file loaded
/// decides the start chapter.
fn load_stories_recursive(dir: &Path, story: &mut Option<Story>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            load_stories_recursive(&path, story);
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("ron") && ext != Some("json") {
            continue;
        }
        match Story::load(&path) {
            Ok(loaded) => {
                println!("  Loaded: {}", path.display());
                match story.as_mut() {
                    Some(existing) => existing.merge(loaded),
                    None => *story = Some(loaded),
                }
            }
            // Background and config files share the directory; skip them.
            Err(e) => eprintln!("  Skipped {}: {}", path.display(), e),
        }
    }
}
