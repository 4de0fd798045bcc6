// src/output.rs

//! Labeled terminal output shared by every step of every pipeline.
//!
//! Many tasks write here at once (one per output pipe of each process, plus
//! the watcher and the supervisor). Implementations must keep each line
//! intact; [`ConsoleOutput`] does this by holding the stdout lock per line.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use colored::{Color, Colorize};

/// Prefix shown in front of a line, e.g. `[BUILD - api]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    text: String,
    color: Color,
}

impl Label {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    /// The tool's own messages.
    pub fn system() -> Self {
        Self::new("REWATCH", Color::Magenta)
    }

    pub fn watcher() -> Self {
        Self::new("WATCHER", Color::BrightYellow)
    }

    pub fn build() -> Self {
        Self::new("BUILD", Color::Red)
    }

    /// Process output of a schema.
    pub fn schema(text: &str) -> Self {
        let text = if text.is_empty() { "APP" } else { text };
        Self::new(text, Color::Green)
    }

    /// `self - suffix`, or `self` unchanged when `suffix` is empty.
    pub fn sub(&self, suffix: &str) -> Self {
        if suffix.is_empty() {
            return self.clone();
        }
        Self::new(format!("{} - {}", self.text, suffix), self.color)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Destination for `(label, line)` pairs.
pub trait OutputSink: Send + Sync {
    fn push(&self, label: &Label, line: &str);

    /// A line that already carries its own formatting (relayed child output).
    fn push_raw(&self, line: &str);
}

pub type SharedOutput = Arc<dyn OutputSink>;

/// Writes to the process stdout, coloring labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn shared() -> SharedOutput {
        Arc::new(ConsoleOutput)
    }
}

impl OutputSink for ConsoleOutput {
    fn push(&self, label: &Label, line: &str) {
        let prefix = format!("[{}]", label.text()).color(label.color());
        let mut out = std::io::stdout().lock();
        // A closed stdout is not worth failing a supervisor over.
        let _ = writeln!(out, "{prefix} {line}");
    }

    fn push_raw(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_labels_compose() {
        let label = Label::watcher().sub("api");
        assert_eq!(label.text(), "WATCHER - api");
        assert_eq!(label.color(), Color::BrightYellow);
        assert_eq!(Label::build().sub(""), Label::build());
    }

    #[test]
    fn unnamed_schema_gets_default_label() {
        assert_eq!(Label::schema("").text(), "APP");
        assert_eq!(Label::schema("api").sub("worker").to_string(), "api - worker");
    }
}
