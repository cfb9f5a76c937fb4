//! Command name normalization
//!
//! Canonical command names carry a leading `/` and compare ASCII
//! case-insensitively, so `help`, `/help` and `/HELP` are one command.

/// Prefix every canonical command name starts with
pub const COMMAND_PREFIX: char = '/';

/// Canonical form of a command name or alias
pub fn normalize(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with(COMMAND_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", COMMAND_PREFIX, trimmed)
    }
}

/// Compare two names after normalization
pub fn names_equal(a: &str, b: &str) -> bool {
    normalize(a).eq_ignore_ascii_case(&normalize(b))
}

/// Sort key for case-insensitive ordering
pub fn sort_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Strip `prefix` from the start of `input`, ignoring ASCII case
pub fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        input.get(prefix.len()..)
    } else {
        None
    }
}
