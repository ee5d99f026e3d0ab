//! Reveal scheduler: progressive, cancellable rendering of one line.
//!
//! Single-threaded and cooperative. The host calls [`RevealScheduler::advance`]
//! with elapsed time; each elapsed step delay emits one step. A step is one
//! character of plain text or one whole markup span. A skip request is
//! observed at the next step boundary and flushes the final content in a
//! single write.

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

use crate::core::markup::{self, TextToken};
use crate::core::output::{OutputSink, StyleTag};
use crate::schema::story::Fx;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("a reveal is already in progress")]
    AlreadyRevealing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStatus {
    /// Nothing is being revealed.
    Idle,
    /// Steps remain.
    Pending,
    /// The reveal finished during this call.
    Complete,
}

/// Generator over reveal steps, in source order.
#[derive(Debug, Clone)]
pub struct RevealSteps {
    tokens: VecDeque<TextToken>,
    chars: VecDeque<char>,
}

impl RevealSteps {
    pub fn new(tokens: Vec<TextToken>) -> Self {
        Self {
            tokens: tokens.into(),
            chars: VecDeque::new(),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.chars.is_empty()
            && self.tokens.iter().all(|t| matches!(t, TextToken::Literal(s) if s.is_empty()))
    }
}

impl Iterator for RevealSteps {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(c) = self.chars.pop_front() {
                return Some(c.to_string());
            }
            match self.tokens.pop_front()? {
                TextToken::Literal(text) => self.chars.extend(text.chars()),
                TextToken::Markup(span) => return Some(TextToken::Markup(span).render()),
            }
        }
    }
}

#[derive(Debug)]
struct ActiveReveal {
    steps: RevealSteps,
    full: String,
    step_delay: Duration,
    banked: Duration,
}

/// Drives at most one reveal at a time.
#[derive(Debug, Default)]
pub struct RevealScheduler {
    active: Option<ActiveReveal>,
    skip_requested: bool,
}

impl RevealScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_revealing(&self) -> bool {
        self.active.is_some()
    }

    pub fn skip_requested(&self) -> bool {
        self.skip_requested
    }

    /// Open a line on the sink and start revealing `markup_text` into it.
    pub fn begin(
        &mut self,
        sink: &mut dyn OutputSink,
        markup_text: &str,
        style: StyleTag,
        fx: Option<Fx>,
        step_delay: Duration,
    ) -> Result<(), RevealError> {
        if self.active.is_some() {
            return Err(RevealError::AlreadyRevealing);
        }
        let tokens = markup::parse(markup_text);
        let full = markup::render(&tokens);
        sink.open_line(style, fx);
        self.skip_requested = false;
        self.active = Some(ActiveReveal {
            steps: RevealSteps::new(tokens),
            full,
            step_delay,
            banked: Duration::ZERO,
        });
        Ok(())
    }

    /// Ask the active reveal to finish. Idempotent; a no-op when idle.
    pub fn request_skip(&mut self) {
        if self.active.is_some() {
            self.skip_requested = true;
        }
    }

    /// Emit every step that `elapsed` pays for. A zero step delay reveals
    /// everything on the first call.
    pub fn advance(&mut self, sink: &mut dyn OutputSink, elapsed: Duration) -> RevealStatus {
        let Some(active) = self.active.as_mut() else {
            return RevealStatus::Idle;
        };

        if self.skip_requested {
            sink.set_line(&active.full);
            return self.finish(sink);
        }

        active.banked += elapsed;
        loop {
            if active.steps.is_exhausted() {
                return self.finish(sink);
            }
            if !active.step_delay.is_zero() {
                if active.banked < active.step_delay {
                    return RevealStatus::Pending;
                }
                active.banked -= active.step_delay;
            }
            match active.steps.next() {
                Some(fragment) => sink.append(&fragment),
                None => return self.finish(sink),
            }
        }
    }

    fn finish(&mut self, sink: &mut dyn OutputSink) -> RevealStatus {
        sink.close_line();
        self.active = None;
        self.skip_requested = false;
        RevealStatus::Complete
    }
}
