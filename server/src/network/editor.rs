//! Line editor for long texts. While it runs, every line the client sends
//! goes to the editor instead of the command dispatcher.

use crate::world::RoomKey;

/// What a finished edit is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    RoomDesc(RoomKey),
    CharDesc,
}

pub const EDITOR_HELP: &str = "\r\n&Y--- Editor ---&d\r\n\
    &W\\w&d or &W@&d save and exit   &W\\q&d abort   &W\\l&d list\r\n\
    &W\\c&d clear   &W\\d&d delete last line   &W\\h&d help\r\n";

/// Result of feeding a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Keep editing; optionally show something
    Continue(Option<String>),
    Save(String),
    Abort,
}

#[derive(Debug, Default)]
pub struct Editor {
    lines: Vec<String>,
}

impl Editor {
    pub fn new(initial: &str) -> Self {
        Self {
            lines: initial.lines().map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\r\n")
    }

    /// Numbered listing of the buffer
    pub fn listing(&self) -> String {
        let mut out = String::from("\r\n");
        for (i, line) in self.lines.iter().enumerate() {
            out.push_str(&format!("&Y{:>3}&d| {}\r\n", i + 1, line));
        }
        out
    }

    pub fn feed(&mut self, line: &str) -> EditorAction {
        match line.trim() {
            "\\w" | "@" => EditorAction::Save(self.text()),
            "\\q" => EditorAction::Abort,
            "\\l" => EditorAction::Continue(Some(self.listing())),
            "\\h" => EditorAction::Continue(Some(EDITOR_HELP.to_string())),
            "\\c" => {
                self.lines.clear();
                EditorAction::Continue(Some("\r\nBuffer cleared.\r\n".into()))
            }
            "\\d" => {
                let msg = match self.lines.pop() {
                    Some(_) => "\r\nLine deleted.\r\n",
                    None => "\r\nThe buffer is empty.\r\n",
                };
                EditorAction::Continue(Some(msg.into()))
            }
            _ => {
                self.lines.push(line.to_string());
                EditorAction::Continue(None)
            }
        }
    }
}
