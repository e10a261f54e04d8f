//! Shell-style splitting of the descriptor `command-line` string.

use crate::descriptor::{SchemaError, SchemaProblem};

/// Splits a command line into words, POSIX-shell style: whitespace
/// separates words, single quotes are literal, double quotes allow `\"`
/// and `\\` escapes, and a backslash outside quotes escapes the next
/// character.
pub(crate) fn shell_split(command: &str) -> Result<Vec<String>, SchemaError> {
    let mut words: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = command.chars();

    let unterminated = || SchemaError {
        path: "command-line".to_string(),
        problem: SchemaProblem::UnterminatedQuote,
    };

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if let Some(word) = current.take() {
                    words.push(word);
                }
            }
            '\\' => {
                let escaped = chars.next().ok_or_else(unterminated)?;
                current.get_or_insert_default().push(escaped);
            }
            '\'' => {
                let word = current.get_or_insert_default();
                loop {
                    match chars.next() {
                        None => return Err(unterminated()),
                        Some('\'') => break,
                        Some(c) => word.push(c),
                    }
                }
            }
            '"' => {
                let word = current.get_or_insert_default();
                loop {
                    match chars.next() {
                        None => return Err(unterminated()),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars.next().ok_or_else(unterminated)?;
                            if escaped != '"' && escaped != '\\' {
                                word.push('\\');
                            }
                            word.push(escaped);
                        }
                        Some(c) => word.push(c),
                    }
                }
            }
            c => current.get_or_insert_default().push(c),
        }
    }
    if let Some(word) = current.take() {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use test_casing::{TestCases, cases, test_casing};

    use super::*;

    const CASES: TestCases<(&'static str, &'static [&'static str])> = cases! {
        [
            ("bet [INFILE] [OUTFILE]", &["bet", "[INFILE]", "[OUTFILE]"][..]),
            ("tool  --opt   value", &["tool", "--opt", "value"][..]),
            ("tool 'quoted arg'", &["tool", "quoted arg"][..]),
            (r#"tool "a \"b\" c""#, &["tool", r#"a "b" c"#][..]),
            (r#"tool a\ b"#, &["tool", "a b"][..]),
            ("run [A][B]", &["run", "[A][B]"][..]),
            ("", &[][..]),
        ]
    };

    #[test_casing(7, CASES)]
    #[gtest]
    fn test_shell_split(input: &'static str, expected: &'static [&'static str]) -> Result<()> {
        let words = shell_split(input)?;
        expect_that!(words, eq(expected));
        Ok(())
    }

    #[gtest]
    fn test_unterminated_quote_is_rejected() {
        expect_that!(
            shell_split("tool 'oops"),
            err(displays_as(contains_substring("unterminated quote")))
        );
    }
}
