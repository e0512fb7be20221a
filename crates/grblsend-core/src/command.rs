//! G-code command normalization
//!
//! Raw program lines are reduced to the text the controller should see:
//! surrounding whitespace removed, pure comment lines dropped and trailing
//! `;` comments cut off.

use std::fmt;

/// A normalized, non-empty G-code line ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Normalize a raw line. Returns `None` for blank and comment-only lines.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = normalize(raw);
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    /// The command text without a line terminator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire form: the command followed by a newline
    pub fn to_line(&self) -> String {
        format!("{}\n", self.0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip whitespace and comments from a raw line.
///
/// An empty result means the line carries nothing to send.
pub fn normalize(raw: &str) -> &str {
    let line = raw.trim();
    if line.is_empty() || line.starts_with(';') || line.starts_with('(') {
        return "";
    }
    match line.find(';') {
        Some(pos) => line[..pos].trim(),
        None => line,
    }
}
