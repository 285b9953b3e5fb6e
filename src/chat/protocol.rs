//! Wire format: line classification on the way in, message text on the way out.
//!
//! Every server → client message is a complete line ending in `\n`, except the rename
//! prompt which leaves the cursor on the same line.

/// Width of the `who` listing border.
const BORDER: &str = "============================";

pub const RENAME_PROMPT: &str = "Enter your new name: ";
pub const SERVER_FULL: &str = "*** The chatroom is full, try again later\n";

/// One classified line of client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Who,
    Rename,
    Bye,
    /// Nothing left after stripping the terminator.
    Blank,
    Chat(&'a str),
}

/// Strip one trailing `\n` and an optional `\r` before it.
///
/// Callers handle the zero-byte (EOF) case before getting here; an empty or
/// unterminated buffer is returned unchanged.
pub fn strip_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Classify a stripped line. Commands match on the trimmed text and also accept a
/// leading backslash (`\who`).
pub fn classify(line: &str) -> Command<'_> {
    let word = line.trim();
    if word.is_empty() {
        return Command::Blank;
    }
    match word.strip_prefix('\\').unwrap_or(word) {
        "who" => Command::Who,
        "rename" => Command::Rename,
        "bye" => Command::Bye,
        _ => Command::Chat(line),
    }
}

pub fn chat_line(display_name: &str, text: &str) -> String {
    format!("[{}]: {}\n", display_name, text)
}

pub fn join_notice(id: &str) -> String {
    format!("*** [{}] joined the chat\n", id)
}

pub fn leave_notice(id: &str) -> String {
    format!("*** [{}] left the chat\n", id)
}

pub fn rename_notice(old: &str, new: &str) -> String {
    format!("*** [{}] is now known as [{}]\n", old, new)
}

pub fn rename_ok(new: &str) -> String {
    format!("Rename successful! You are now known as {}\n", new)
}

pub fn rename_failed(reason: &dyn std::fmt::Display) -> String {
    format!("Rename failed: {}\n", reason)
}

pub fn line_too_long(max_bytes: usize) -> String {
    format!("*** Line too long (max {} bytes), discarded\n", max_bytes)
}

/// Bordered, numbered list of display names for the `who` command.
pub fn who_listing(names: &[String]) -> String {
    let mut out = String::new();
    out.push_str(BORDER);
    out.push('\n');
    out.push_str(&format!("Online users ({}):\n", names.len()));
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, name));
    }
    out.push_str(BORDER);
    out.push('\n');
    out
}
