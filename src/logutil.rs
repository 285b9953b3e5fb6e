//! Log sanitizing for text that arrives from chat clients.
//!
//! Clients can send anything a terminal can type, including stray `\r` from telnet,
//! escape sequences and very long lines. Everything logged on their behalf is wrapped in
//! [`ClientText`] so one record stays on one line. The wrapper formats lazily, so records
//! filtered out by the log level cost nothing.

use std::fmt;

/// Longest preview kept from a single client string.
pub const MAX_PREVIEW_CHARS: usize = 200;

/// Client-supplied text, displayed escaped and truncated.
///
/// The line terminator of a wire message is dropped; embedded `\r`, `\n`, `\t` and `\\`
/// are escaped, other control characters become `\xNN`.
#[derive(Debug, Clone, Copy)]
pub struct ClientText<'a>(pub &'a str);

pub fn client_text(s: &str) -> ClientText<'_> {
    ClientText(s)
}

impl fmt::Display for ClientText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.0.strip_suffix('\n').unwrap_or(self.0);
        let mut chars = body.chars();
        for ch in chars.by_ref().take(MAX_PREVIEW_CHARS) {
            match ch {
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c if c.is_control() => write!(f, "\\x{:02X}", c as u32)?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        if chars.next().is_some() {
            f.write_str("…")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_wire_terminator_but_escapes_stray_cr() {
        assert_eq!(client_text("hello\r\n").to_string(), "hello\\r");
        assert_eq!(client_text("[bob]: hi\n").to_string(), "[bob]: hi");
        assert_eq!(client_text("a\tb\\c").to_string(), "a\\tb\\\\c");
    }

    #[test]
    fn escapes_terminal_control_sequences() {
        assert_eq!(client_text("\u{1b}[31mred").to_string(), "\\x1B[31mred");
    }

    #[test]
    fn truncates_long_lines() {
        let exact = "y".repeat(MAX_PREVIEW_CHARS);
        assert_eq!(client_text(&exact).to_string(), exact);

        let long = "x".repeat(MAX_PREVIEW_CHARS + 50);
        let shown = client_text(&long).to_string();
        assert_eq!(shown.chars().count(), MAX_PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
    }
}
