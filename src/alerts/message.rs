//! Structured notification messages
//!
//! Messages are built from styled segments and rendered either to the chat
//! destination's HTML subset or to plain text for the console.

use std::fmt::Write as _;

/// A styled piece of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Bold(String),
    Italic(String),
    Link { label: String, url: String },
    LineBreak,
}

/// Ordered list of segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    segments: Vec<Segment>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Text(text.into()));
        self
    }

    pub fn bold(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Bold(text.into()));
        self
    }

    pub fn italic(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Italic(text.into()));
        self
    }

    pub fn link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.segments.push(Segment::Link {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    pub fn line(mut self) -> Self {
        self.segments.push(Segment::LineBreak);
        self
    }

    /// Append all segments of another message
    pub fn append(mut self, other: Message) -> Self {
        self.segments.extend(other.segments);
        self
    }

    /// Copy of this message with `other` placed in front
    pub fn prepend(self, other: Message) -> Self {
        other.append(self)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render to the Telegram HTML subset (`<b>`, `<i>`, `<a href>`)
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(&escape_html(text)),
                Segment::Bold(text) => {
                    let _ = write!(out, "<b>{}</b>", escape_html(text));
                }
                Segment::Italic(text) => {
                    let _ = write!(out, "<i>{}</i>", escape_html(text));
                }
                Segment::Link { label, url } => {
                    let _ = write!(
                        out,
                        "<a href=\"{}\">{}</a>",
                        escape_html(url),
                        escape_html(label)
                    );
                }
                Segment::LineBreak => out.push('\n'),
            }
        }
        out
    }

    /// Render without markup; links show their target
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) | Segment::Bold(text) | Segment::Italic(text) => {
                    out.push_str(text)
                }
                Segment::Link { label, url } => {
                    let _ = write!(out, "{label} [{url}]");
                }
                Segment::LineBreak => out.push('\n'),
            }
        }
        out
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
