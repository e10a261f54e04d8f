//! Maps descriptor-supplied names to collision-free target identifiers.
//!
//! A [SymbolScope] is local to one compilation call. It is seeded with the
//! target language's reserved words (passed in as configuration) and hands
//! out identifiers deterministically in the order names are offered, so
//! repeated compilations of the same descriptor produce byte-identical
//! symbol tables.


/// Collision resolution gives up after this many suffix attempts. Reaching
/// it indicates a configuration problem, not expected input.
const MAX_DODGE: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum IdentifierResolutionError {
    #[error("symbol {symbol:?} is not a legal identifier")]
    IllegalSymbol { symbol: String },
    #[error("symbol {symbol:?} already exists in scope")]
    Collision { symbol: String },
    #[error("no free identifier found for {symbol:?} after {attempts} attempts")]
    Exhausted { symbol: String, attempts: usize },
}

/// A set of taken identifiers within one generated artifact.
#[derive(Debug)]
pub struct SymbolScope {
    taken: hashbrown::HashSet<String>,
}

impl SymbolScope {
    /// Creates a scope with the given reserved words pre-taken.
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: reserved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.taken.contains(symbol)
    }

    /// Claims `symbol` exactly, failing on collision or illegal spelling.
    pub fn add_or_die(&mut self, symbol: &str) -> Result<String, IdentifierResolutionError> {
        if !is_legal_symbol(symbol) {
            return Err(IdentifierResolutionError::IllegalSymbol {
                symbol: symbol.to_string(),
            });
        }
        if self.contains(symbol) {
            return Err(IdentifierResolutionError::Collision {
                symbol: symbol.to_string(),
            });
        }
        self.taken.insert(symbol.to_string());
        Ok(symbol.to_string())
    }

    /// Claims `symbol`, or the nearest variant with the shortest numeric
    /// suffix that restores uniqueness: `symbol`, `symbol_`, `symbol_2`,
    /// `symbol_3`, ...
    pub fn add_or_dodge(&mut self, symbol: &str) -> Result<String, IdentifierResolutionError> {
        for dodge in 0..MAX_DODGE {
            let candidate = match dodge {
                0 => symbol.to_string(),
                1 => format!("{symbol}_"),
                n => format!("{symbol}_{n}"),
            };
            if !self.contains(&candidate) {
                return self.add_or_die(&candidate);
            }
        }
        Err(IdentifierResolutionError::Exhausted {
            symbol: symbol.to_string(),
            attempts: MAX_DODGE,
        })
    }
}

fn is_legal_symbol(symbol: &str) -> bool {
    lazy_regex::regex!(r#"^[a-zA-Z_][a-zA-Z0-9_]*$"#).is_match(symbol)
}

/// Converts an arbitrary descriptor name into a legal snake_case symbol.
///
/// Illegal characters become word separators, camelCase boundaries become
/// underscores, and a leading digit gets a `v_` prefix. The result is never
/// empty.
pub fn symbol_from(name: &str) -> String {
    let snake = snake_case(name);
    match snake.chars().next() {
        None => "param".to_string(),
        Some(first) if first.is_ascii_digit() => format!("v_{snake}"),
        Some(_) => snake,
    }
}

/// Converts a string to snake case. Consecutive uppercase letters do not
/// receive underscores between them.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Converts a string to pascal case.
pub fn pascal_case(name: &str) -> String {
    snake_case(name)
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
