//! Indentation-aware line buffer for emitting source text.

const INDENT: &str = "    ";

/// Accumulates source lines at a tracked indentation depth.
#[derive(Debug, Default)]
pub(crate) struct SourceBuffer {
    lines: Vec<String>,
    depth: usize,
}

impl SourceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line at the current depth.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.blank();
            return;
        }
        self.lines.push(format!("{}{}", INDENT.repeat(self.depth), text));
    }

    /// Appends an empty line, collapsing runs of blanks to one.
    pub fn blank(&mut self) {
        if self.lines.last().is_none_or(|last| !last.is_empty()) {
            self.lines.push(String::new());
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.checked_sub(1).expect("dedent below depth zero");
    }

    /// Runs `body` one level deeper.
    pub fn indented(&mut self, body: impl FnOnce(&mut Self)) {
        self.indent();
        body(self);
        self.dedent();
    }

    /// The accumulated text, newline-terminated.
    pub fn finish(mut self) -> String {
        while self.lines.last().is_some_and(String::is_empty) {
            self.lines.pop();
        }
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Renders `text` as a double-quoted Python string literal.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[gtest]
    fn test_tracks_indentation() {
        let mut buf = SourceBuffer::new();
        buf.line("def f():");
        buf.indented(|buf| {
            buf.line("return 1");
        });
        expect_that!(buf.finish(), eq("def f():\n    return 1\n"));
    }

    #[gtest]
    fn test_collapses_blank_runs_and_trims_trailing_blanks() {
        let mut buf = SourceBuffer::new();
        buf.line("a = 1");
        buf.blank();
        buf.blank();
        buf.line("b = 2");
        buf.blank();
        expect_that!(buf.finish(), eq("a = 1\n\nb = 2\n"));
    }

    #[gtest]
    fn test_quote_escapes_specials() {
        expect_that!(quote("plain"), eq("\"plain\""));
        expect_that!(quote("a\"b\\c\nd"), eq("\"a\\\"b\\\\c\\nd\""));
    }
}
