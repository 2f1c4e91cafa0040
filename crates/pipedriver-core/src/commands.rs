//! Ordered command queue with a send cursor.

/// Literal two-character marker separating consecutive commands in raw input.
pub const COMMAND_SEPARATOR: &str = r"\n";

/// Commands to send, in order, and how far sending has progressed.
///
/// The cursor equals `len()` once every command has been handed out, and
/// `len() + 1` once the completion notice has been taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandQueue {
    commands: Vec<String>,
    cursor: usize,
}

impl CommandQueue {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            commands,
            cursor: 0,
        }
    }

    /// Split raw input on [`COMMAND_SEPARATOR`].
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(COMMAND_SEPARATOR).map(str::to_string).collect())
    }

    /// Join command-line words with single spaces, then [`parse`](Self::parse).
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        let raw = words
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        Self::parse(&raw)
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Hand out the command at the cursor and advance past it.
    pub fn next_command(&mut self) -> Option<String> {
        let command = self.commands.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(command)
    }

    /// No commands are left to send.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.commands.len()
    }

    /// The last command has been sent and the completion notice is still owed.
    pub fn just_completed(&self) -> bool {
        self.cursor == self.commands.len()
    }

    /// Returns true exactly once, the first time it is called after the last
    /// command was handed out.
    pub fn take_completion_notice(&mut self) -> bool {
        if self.just_completed() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }
}
