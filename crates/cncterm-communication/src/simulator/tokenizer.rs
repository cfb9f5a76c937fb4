//! Machine command tokenizer
//!
//! Splits one line of operator text into a command name and its
//! `<letter><number>` parameter words. Lines starting with a G or M code
//! are G-code; any other word is treated as a machine macro name.

use regex::Regex;
use std::sync::OnceLock;

/// Kind of machine command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// A G or M code
    GCode,
    /// A named machine macro
    Macro,
}

/// One tokenized machine command
#[derive(Debug, Clone, PartialEq)]
pub struct MachineCommand {
    /// Upper-case command name (`G0`, `M3`, `HOME`)
    pub name: String,
    /// Command kind
    pub kind: CommandKind,
    /// Parameter words in the order written
    pub params: Vec<(char, f64)>,
}

impl MachineCommand {
    /// Value of a parameter word; the last occurrence wins
    pub fn param(&self, letter: char) -> Option<f64> {
        let letter = letter.to_ascii_uppercase();
        self.params
            .iter()
            .rev()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }
}

fn code_regex() -> &'static Regex {
    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    CODE_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)([GM])0*(\d+(?:\.\d+)?)").expect("invalid regex pattern")
    })
}

fn param_regex() -> &'static Regex {
    static PARAM_REGEX: OnceLock<Regex> = OnceLock::new();
    PARAM_REGEX.get_or_init(|| {
        Regex::new(r"(?i)([A-Z])\s*(-?\d+(?:\.\d+)?|-?\.\d+)").expect("invalid regex pattern")
    })
}

fn comment_regex() -> &'static Regex {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMENT_REGEX.get_or_init(|| Regex::new(r"[;(].*").expect("invalid regex pattern"))
}

/// Tokenize one line.
///
/// Returns `None` for blank lines, comment-only lines and client commands
/// (lines starting with `/`).
pub fn tokenize(line: &str) -> Option<MachineCommand> {
    let line = comment_regex().replace(line, "");
    let line = line.trim();
    if line.is_empty() || line.starts_with('/') {
        return None;
    }

    if let Some(caps) = code_regex().captures(line) {
        let letter = caps[1].to_ascii_uppercase();
        let rest = &line[caps[0].len()..];
        return Some(MachineCommand {
            name: format!("{}{}", letter, &caps[2]),
            kind: CommandKind::GCode,
            params: parse_params(rest),
        });
    }

    let mut words = line.splitn(2, char::is_whitespace);
    let name = words.next().unwrap_or_default().to_ascii_uppercase();
    let rest = words.next().unwrap_or_default();
    Some(MachineCommand {
        name,
        kind: CommandKind::Macro,
        params: parse_params(rest),
    })
}

fn parse_params(text: &str) -> Vec<(char, f64)> {
    param_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let letter = caps[1].chars().next()?.to_ascii_uppercase();
            let value = caps[2].parse::<f64>().ok()?;
            Some((letter, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcode_with_params() {
        let cmd = tokenize("g1 x10.5 Y-5 f300").unwrap();
        assert_eq!(cmd.name, "G1");
        assert_eq!(cmd.kind, CommandKind::GCode);
        assert_eq!(cmd.param('X'), Some(10.5));
        assert_eq!(cmd.param('y'), Some(-5.0));
        assert_eq!(cmd.param('F'), Some(300.0));
        assert_eq!(cmd.param('Z'), None);
    }

    #[test]
    fn test_leading_zeros_and_packed_words() {
        let cmd = tokenize("G01X1Y2").unwrap();
        assert_eq!(cmd.name, "G1");
        assert_eq!(cmd.params, vec![('X', 1.0), ('Y', 2.0)]);

        let cmd = tokenize("G00").unwrap();
        assert_eq!(cmd.name, "G0");
    }

    #[test]
    fn test_comments_are_stripped() {
        let cmd = tokenize("G0 X5 (rapid) ; move").unwrap();
        assert_eq!(cmd.params, vec![('X', 5.0)]);
        assert!(tokenize("; just a comment").is_none());
    }

    #[test]
    fn test_macro_names() {
        let cmd = tokenize("home").unwrap();
        assert_eq!(cmd.name, "HOME");
        assert_eq!(cmd.kind, CommandKind::Macro);
        assert!(cmd.params.is_empty());
    }

    #[test]
    fn test_client_commands_and_blanks_are_not_machine_commands() {
        assert!(tokenize("/help").is_none());
        assert!(tokenize("   ").is_none());
    }

    #[test]
    fn test_spindle_word() {
        let cmd = tokenize("M3 S 8000").unwrap();
        assert_eq!(cmd.name, "M3");
        assert_eq!(cmd.param('S'), Some(8000.0));
    }
}
