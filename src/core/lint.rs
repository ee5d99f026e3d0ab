//! Static checks over story data: dangling chapter links, unreachable
//! chapters, unresolvable variants and unattainable stat gates.

use rustc_hash::FxHashSet;

use crate::core::resolver::PLACEHOLDERS;
use crate::schema::profile::{BackgroundCatalog, Stat, BASE_STAT};
use crate::schema::story::{Condition, SceneKind, Story};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

pub fn lint_story(story: &Story, catalog: &BackgroundCatalog) -> LintReport {
    let mut report = LintReport::default();

    if story.chapter(&story.start).is_none() {
        report
            .errors
            .push(format!("start chapter '{}' does not exist", story.start));
    }

    let mut ids: Vec<&String> = story.chapters.keys().collect();
    ids.sort();

    for id in &ids {
        let chapter = &story.chapters[id.as_str()];

        if let Some(ref next) = chapter.next_chapter {
            if story.chapter(next).is_none() {
                report
                    .errors
                    .push(format!("{}: next_chapter '{}' does not exist", id, next));
            }
        }

        if chapter.scenes.is_empty() {
            report.warnings.push(format!("{}: chapter has no scenes", id));
        }

        for (index, scene) in chapter.scenes.iter().enumerate() {
            let at = format!("{}[{}]", id, index);

            if scene.variants.is_empty() {
                report.errors.push(format!("{}: scene has no text", at));
            } else if !scene.variants.iter().any(|v| v.condition == Condition::Default) {
                report
                    .warnings
                    .push(format!("{}: no default variant, may resolve to fallback text", at));
            }

            for variant in &scene.variants {
                if let Condition::ClassMatch(ref class) = variant.condition {
                    if !catalog.is_empty() && catalog.get(class).is_none() {
                        report.warnings.push(format!(
                            "{}: condition '{}' names no known background",
                            at, class
                        ));
                    }
                }
                check_placeholders(&at, &variant.text, &mut report);
            }

            if let SceneKind::Choice(ref choices) = scene.kind {
                for choice in choices {
                    check_placeholders(&at, &choice.text, &mut report);
                    if let Some(ref target) = choice.target {
                        if story.chapter(target).is_none() {
                            report.errors.push(format!(
                                "{}: choice '{}' targets missing chapter '{}'",
                                at, choice.text, target
                            ));
                        }
                    }
                    if let Some(req) = choice.requirement {
                        let ceiling = attainable(req.stat, catalog);
                        if req.min_value > ceiling {
                            report.warnings.push(format!(
                                "{}: choice '{}' needs {} {} but backgrounds reach at most {}",
                                at, choice.text, req.stat, req.min_value, ceiling
                            ));
                        }
                    }
                }
            }
        }
    }

    let reachable = reachable_chapters(story);
    for id in &ids {
        if !reachable.contains(id.as_str()) {
            report
                .warnings
                .push(format!("{}: chapter is unreachable from '{}'", id, story.start));
        }
    }

    report
}

/// Highest value a fresh profile can hold for `stat`.
fn attainable(stat: Stat, catalog: &BackgroundCatalog) -> i32 {
    let best_bonus = catalog
        .backgrounds
        .iter()
        .filter_map(|b| b.bonus.get(&stat).copied())
        .max()
        .unwrap_or(0);
    BASE_STAT + best_bonus.max(0)
}

fn check_placeholders(at: &str, text: &str, report: &mut LintReport) {
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = &after[..close];
        if !PLACEHOLDERS.contains(&name) {
            report
                .warnings
                .push(format!("{}: unknown placeholder '{{{}}}'", at, name));
        }
        rest = &after[close + 1..];
    }
}

fn reachable_chapters(story: &Story) -> FxHashSet<&str> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![story.start.as_str()];
    while let Some(id) = stack.pop() {
        let Some(chapter) = story.chapter(id) else {
            continue;
        };
        if !seen.insert(chapter.id.as_str()) {
            continue;
        }
        if let Some(ref next) = chapter.next_chapter {
            stack.push(next);
        }
        for scene in &chapter.scenes {
            if let SceneKind::Choice(ref choices) = scene.kind {
                stack.extend(choices.iter().filter_map(|c| c.target.as_deref()));
            }
        }
    }
    seen
}
