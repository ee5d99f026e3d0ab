//! Markup tokenizer for revealed text.
//!
//! Scene text may carry inline markup: HTML-like tags (`<i>..</i>`,
//! `<br>`) and `**strong**` emphasis. Parsing it into a token tree lets the
//! reveal scheduler emit each markup span as one indivisible step, so a
//! partially revealed line never contains half a tag.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Elements that never have children or a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// Deeper nesting is kept as literal text.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TextToken {
    /// Plain text, revealed one character at a time.
    Literal(String),
    /// A markup element, revealed atomically.
    Markup(MarkupSpan),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupSpan {
    pub tag: String,
    /// Raw attribute text, kept verbatim for rendering.
    pub attrs: String,
    pub children: Vec<TextToken>,
    pub void: bool,
}

impl TextToken {
    pub fn render_into(&self, out: &mut String) {
        match self {
            TextToken::Literal(text) => out.push_str(text),
            TextToken::Markup(span) => span.render_into(out),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }
}

impl MarkupSpan {
    fn render_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if !self.attrs.is_empty() {
            out.push(' ');
            out.push_str(&self.attrs);
        }
        out.push('>');
        if self.void {
            return;
        }
        for child in &self.children {
            child.render_into(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// Render a token stream back to markup.
pub fn render(tokens: &[TextToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        token.render_into(&mut out);
    }
    out
}

/// Strip markup for plain-text sinks. `<br>` becomes a newline.
pub fn plain_text(tokens: &[TextToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            TextToken::Literal(text) => out.push_str(text),
            TextToken::Markup(span) if span.tag == "br" => out.push('\n'),
            TextToken::Markup(span) => out.push_str(&plain_text(&span.children)),
        }
    }
    out
}

/// Parse text into tokens. Never fails: malformed markup (an unclosed tag,
/// a stray `</x>`, an unpaired `**`) is kept as literal text.
pub fn parse(input: &str) -> Vec<TextToken> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
        elements: FxHashMap::default(),
        strong: FxHashMap::default(),
    };
    match parser.parse_nodes(&Closer::Eof) {
        Some(tokens) => tokens,
        // Unreachable for `Closer::Eof`, but keep the input intact regardless.
        None => vec![TextToken::Literal(input.to_string())],
    }
}

enum Closer {
    Eof,
    Tag(String),
    Stars,
}

/// Outcome of parsing a construct opening at some position, with the
/// position just past it. A construct's parse depends only on where it
/// opens, so each opening is parsed at most once however often an
/// enclosing construct fails and backtracks over it.
type Parsed<T> = Option<(T, usize)>;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    elements: FxHashMap<usize, Parsed<MarkupSpan>>,
    strong: FxHashMap<usize, Parsed<Vec<TextToken>>>,
}

impl Parser {
    fn starts_with(&self, pat: &str) -> bool {
        let mut i = self.pos;
        for c in pat.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Parse until `closer` is consumed. `None` means the closer never
    /// appeared and the caller must backtrack.
    fn parse_nodes(&mut self, closer: &Closer) -> Option<Vec<TextToken>> {
        let mut tokens = Vec::new();
        let mut literal = String::new();

        while self.pos < self.chars.len() {
            match closer {
                Closer::Stars if self.starts_with("**") => {
                    self.pos += 2;
                    flush(&mut literal, &mut tokens);
                    return Some(tokens);
                }
                Closer::Tag(name) if self.starts_with(&format!("</{}>", name)) => {
                    self.pos += name.chars().count() + 3;
                    flush(&mut literal, &mut tokens);
                    return Some(tokens);
                }
                _ => {}
            }

            if self.starts_with("**") {
                match self.strong_at(self.pos) {
                    Some((children, end)) => {
                        flush(&mut literal, &mut tokens);
                        tokens.push(TextToken::Markup(MarkupSpan {
                            tag: "strong".to_string(),
                            attrs: String::new(),
                            children,
                            void: false,
                        }));
                        self.pos = end;
                    }
                    None => {
                        self.pos += 2;
                        literal.push_str("**");
                    }
                }
                continue;
            }

            if self.chars[self.pos] == '<' {
                match self.element_at(self.pos) {
                    Some((span, end)) => {
                        flush(&mut literal, &mut tokens);
                        tokens.push(TextToken::Markup(span));
                        self.pos = end;
                    }
                    None => {
                        self.pos += 1;
                        literal.push('<');
                    }
                }
                continue;
            }

            literal.push(self.chars[self.pos]);
            self.pos += 1;
        }

        match closer {
            Closer::Eof => {
                flush(&mut literal, &mut tokens);
                Some(tokens)
            }
            _ => None,
        }
    }

    /// `**children**` opening at `start`, if it closes with content.
    fn strong_at(&mut self, start: usize) -> Parsed<Vec<TextToken>> {
        if let Some(parsed) = self.strong.get(&start) {
            return parsed.clone();
        }
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.pos = start + 2;
        self.depth += 1;
        let parsed = self
            .parse_nodes(&Closer::Stars)
            .filter(|children| !children.is_empty())
            .map(|children| (children, self.pos));
        self.depth -= 1;
        self.pos = start;
        self.strong.insert(start, parsed.clone());
        parsed
    }

    fn element_at(&mut self, start: usize) -> Parsed<MarkupSpan> {
        if let Some(parsed) = self.elements.get(&start) {
            return parsed.clone();
        }
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.pos = start;
        self.depth += 1;
        let parsed = self.parse_element().map(|span| (span, self.pos));
        self.depth -= 1;
        self.pos = start;
        self.elements.insert(start, parsed.clone());
        parsed
    }

    /// Parse `<tag attrs>children</tag>` or a void element at `self.pos`.
    fn parse_element(&mut self) -> Option<MarkupSpan> {
        let close = self.chars[self.pos..].iter().position(|&c| c == '>')? + self.pos;
        let inner: String = self.chars[self.pos + 1..close].iter().collect();
        let inner = inner.trim();
        if inner.is_empty() || inner.starts_with('/') {
            return None;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/').trim_end();
        let (tag, attrs) = match inner.split_once(char::is_whitespace) {
            Some((tag, attrs)) => (tag, attrs.trim()),
            None => (inner, ""),
        };
        if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let tag = tag.to_ascii_lowercase();
        let attrs = attrs.to_string();
        self.pos = close + 1;

        if self_closing || VOID_TAGS.contains(&tag.as_str()) {
            return Some(MarkupSpan {
                tag,
                attrs,
                children: Vec::new(),
                void: true,
            });
        }

        let children = self.parse_nodes(&Closer::Tag(tag.clone()))?;
        Some(MarkupSpan {
            tag,
            attrs,
            children,
            void: false,
        })
    }
}

fn flush(literal: &mut String, tokens: &mut Vec<TextToken>) {
    if !literal.is_empty() {
        tokens.push(TextToken::Literal(std::mem::take(literal)));
    }
}
