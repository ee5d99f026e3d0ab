//! Text variant resolution and placeholder substitution.

use crate::schema::profile::Profile;
use crate::schema::session::Session;
use crate::schema::story::{Condition, Focus, TextVariant};

/// Text substituted when no variant matches.
pub const FALLBACK_TEXT: &str = "Data Corrupted.";

/// Both stats of a synergy pair must reach this value.
pub const SYNERGY_THRESHOLD: i32 = 5;

/// Placeholder tokens recognised in scene and choice text.
pub const PLACEHOLDERS: [&str; 4] = ["player", "partner", "driver", "passenger"];

/// Score a condition against a profile. Negative means "does not apply".
pub fn priority(condition: &Condition, target: &Profile) -> i32 {
    match condition {
        Condition::Default => 0,
        Condition::ClassMatch(id) if *id == target.background_id => 10,
        Condition::SynergyPair(a, b)
            if target.stats.get(*a) >= SYNERGY_THRESHOLD
                && target.stats.get(*b) >= SYNERGY_THRESHOLD =>
        {
            9
        }
        Condition::OriginContains(needle) if target.origin.to_lowercase().contains(needle.as_str()) => 8,
        Condition::GenderContains(needle) if target.gender.to_lowercase().contains(needle.as_str()) => 7,
        Condition::HighestStat(stat) if target.stats.unique_max() == Some(*stat) => 5,
        _ => -1,
    }
}

/// The profile whose attributes drive resolution for a scene.
pub fn target_profile(session: &Session, focus: Focus) -> &Profile {
    match focus {
        Focus::Partner => &session.partner,
        _ => &session.player,
    }
}

/// Pick the best-scoring applicable variant. Ties go to the earliest.
pub fn select<'a>(variants: &'a [TextVariant], target: &Profile) -> Option<&'a TextVariant> {
    let mut best: Option<(&TextVariant, i32)> = None;
    for variant in variants {
        let score = priority(&variant.condition, target);
        if score < 0 {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((variant, score)),
        }
    }
    best.map(|(variant, _)| variant)
}

/// Replace `{player}`, `{partner}`, `{driver}` and `{passenger}` with
/// session values. Unassigned roles fall back to the profile names.
pub fn substitute(text: &str, session: &Session) -> String {
    text.replace("{player}", &session.player.name)
        .replace("{partner}", &session.partner.name)
        .replace("{driver}", session.driver_or_default())
        .replace("{passenger}", session.passenger_or_default())
}

/// Resolve a scene's text for `focus`, or `None` when nothing matches.
pub fn resolve(variants: &[TextVariant], focus: Focus, session: &Session) -> Option<String> {
    let target = target_profile(session, focus);
    select(variants, target).map(|variant| substitute(&variant.text, session))
}

/// Like [`resolve`], substituting `fallback` (and logging) on failure.
pub fn resolve_or_fallback(
    variants: &[TextVariant],
    focus: Focus,
    session: &Session,
    fallback: &str,
) -> String {
    match resolve(variants, focus, session) {
        Some(text) => text,
        None => {
            log::warn!(
                "no text variant matched ({} candidates, focus {:?}); using fallback",
                variants.len(),
                focus
            );
            fallback.to_string()
        }
    }
}
