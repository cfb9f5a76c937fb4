//! Response template engine
//!
//! A small text template language rendered against a response data map:
//!
//! - `{{.field}}` and `{{.field:F2}}` substitute a value, optionally formatted
//! - `{{if .field}}...{{else}}...{{end}}` renders one branch by truthiness
//! - `{{range .field}}...{{end}}` renders the body once per array element
//!
//! Templates are parsed into a tree first, so blocks nest. Tags that are not
//! part of the language are copied through unchanged. Structural errors
//! replace the whole output with a `[template error: ...]` marker; a bad
//! number format is reported inline at the variable.

use cncterm_core::data::value::{get_ignore_case, to_display};
use cncterm_core::{TemplateError, ValueMap};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Largest precision accepted by a number format
pub const MAX_PRECISION: usize = 30;

/// Field holding non-object elements inside a range body
pub const RANGE_ITEM_FIELD: &str = "item";

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
static BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("invalid regex pattern"))
}

fn var_regex() -> &'static Regex {
    VAR_REGEX.get_or_init(|| {
        Regex::new(r"^\.([A-Za-z_][A-Za-z0-9_]*)(?::(\S+))?$").expect("invalid regex pattern")
    })
}

fn block_regex() -> &'static Regex {
    BLOCK_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)(if|range)\s+\.([A-Za-z_][A-Za-z0-9_]*)$").expect("invalid regex pattern")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Var { field: String, format: Option<String> },
    If(String),
    Range(String),
    Else,
    End,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var { field: String, format: Option<String> },
    If { field: String, then: Vec<Node>, otherwise: Vec<Node> },
    Range { field: String, body: Vec<Node> },
}

enum Closing {
    Else,
    End,
    Eof,
}

/// A parsed template, reusable across renders
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = tokenize(source);
        let mut pos = 0;
        let (nodes, closing) = parse_block(&tokens, &mut pos)?;
        match closing {
            Closing::Eof => Ok(Self { nodes }),
            Closing::Else => Err(TemplateError::UnexpectedTag {
                tag: "else".to_string(),
            }),
            Closing::End => Err(TemplateError::UnexpectedTag {
                tag: "end".to_string(),
            }),
        }
    }

    /// Render against a data map
    pub fn render(&self, context: &ValueMap) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, context, &mut out);
        out
    }
}

/// Renders response templates
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse and render in one step; never fails
    pub fn render(&self, template: &str, context: &ValueMap) -> String {
        match Template::parse(template) {
            Ok(parsed) => parsed.render(context),
            Err(e) => {
                tracing::warn!("Template error: {}", e);
                error_marker(&e)
            }
        }
    }
}

fn error_marker(error: &TemplateError) -> String {
    format!("[template error: {}]", error)
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in tag_regex().captures_iter(source) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(source[last..whole.start()].to_string()));
        }
        tokens.push(classify(body.as_str().trim(), whole.as_str()));
        last = whole.end();
    }
    if last < source.len() {
        tokens.push(Token::Text(source[last..].to_string()));
    }
    tokens
}

fn classify(body: &str, whole: &str) -> Token {
    if body.eq_ignore_ascii_case("else") {
        return Token::Else;
    }
    if body.eq_ignore_ascii_case("end") {
        return Token::End;
    }
    if let Some(caps) = var_regex().captures(body) {
        return Token::Var {
            field: caps[1].to_string(),
            format: caps.get(2).map(|m| m.as_str().to_string()),
        };
    }
    if let Some(caps) = block_regex().captures(body) {
        let field = caps[2].to_string();
        return if caps[1].eq_ignore_ascii_case("if") {
            Token::If(field)
        } else {
            Token::Range(field)
        };
    }
    Token::Text(whole.to_string())
}

fn parse_block(tokens: &[Token], pos: &mut usize) -> Result<(Vec<Node>, Closing), TemplateError> {
    let mut nodes = Vec::new();
    while let Some(token) = tokens.get(*pos) {
        *pos += 1;
        match token {
            Token::Text(text) => nodes.push(Node::Text(text.clone())),
            Token::Var { field, format } => nodes.push(Node::Var {
                field: field.clone(),
                format: format.clone(),
            }),
            Token::If(field) => {
                let (then, closing) = parse_block(tokens, pos)?;
                let otherwise = match closing {
                    Closing::End => Vec::new(),
                    Closing::Else => match parse_block(tokens, pos)? {
                        (otherwise, Closing::End) => otherwise,
                        (_, Closing::Else) => {
                            return Err(TemplateError::UnexpectedTag {
                                tag: "else".to_string(),
                            })
                        }
                        (_, Closing::Eof) => return Err(unterminated("if")),
                    },
                    Closing::Eof => return Err(unterminated("if")),
                };
                nodes.push(Node::If {
                    field: field.clone(),
                    then,
                    otherwise,
                });
            }
            Token::Range(field) => {
                let (body, closing) = parse_block(tokens, pos)?;
                match closing {
                    Closing::End => nodes.push(Node::Range {
                        field: field.clone(),
                        body,
                    }),
                    Closing::Else => {
                        return Err(TemplateError::UnexpectedTag {
                            tag: "else".to_string(),
                        })
                    }
                    Closing::Eof => return Err(unterminated("range")),
                }
            }
            Token::Else => return Ok((nodes, Closing::Else)),
            Token::End => return Ok((nodes, Closing::End)),
        }
    }
    Ok((nodes, Closing::Eof))
}

fn unterminated(tag: &str) -> TemplateError {
    TemplateError::UnterminatedBlock {
        tag: tag.to_string(),
    }
}

fn render_nodes(nodes: &[Node], context: &ValueMap, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { field, format } => {
                let Some(value) = get_ignore_case(context, field) else {
                    continue;
                };
                match (format, value) {
                    (Some(spec), Value::Number(n)) => {
                        match n.as_f64().map(|v| format_number(v, spec)) {
                            Some(Ok(text)) => out.push_str(&text),
                            Some(Err(e)) => out.push_str(&error_marker(&e)),
                            None => out.push_str(&n.to_string()),
                        }
                    }
                    _ => out.push_str(&to_display(value)),
                }
            }
            Node::If {
                field,
                then,
                otherwise,
            } => {
                let branch = if get_ignore_case(context, field).is_some_and(is_truthy) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, context, out);
            }
            Node::Range { field, body } => {
                let Some(Value::Array(items)) = get_ignore_case(context, field) else {
                    continue;
                };
                for item in items {
                    match item {
                        Value::Object(fields) => render_nodes(body, fields, out),
                        other => {
                            let mut scope = ValueMap::new();
                            scope.insert(RANGE_ITEM_FIELD.to_string(), other.clone());
                            render_nodes(body, &scope, out);
                        }
                    }
                    out.push('\n');
                }
            }
        }
    }
}

/// Truthiness used by `if` blocks
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Format a number with a format specifier such as `F2`, `N0`, `D4`, `E3` or `P1`
pub fn format_number(value: f64, spec: &str) -> Result<String, TemplateError> {
    let unsupported = || TemplateError::UnsupportedFormat {
        format: spec.to_string(),
    };

    let mut chars = spec.chars();
    let letter = chars.next().ok_or_else(unsupported)?.to_ascii_uppercase();
    let digits = chars.as_str();
    let precision = if digits.is_empty() {
        None
    } else {
        let p = digits.parse::<usize>().map_err(|_| unsupported())?;
        if p > MAX_PRECISION {
            return Err(unsupported());
        }
        Some(p)
    };

    let text = match letter {
        'F' => format!("{:.*}", precision.unwrap_or(2), value),
        'N' => group_thousands(&format!("{:.*}", precision.unwrap_or(2), value)),
        'D' => {
            let rounded = value.round();
            let digits = format!("{:0width$}", rounded.abs() as u64, width = precision.unwrap_or(0));
            if rounded < 0.0 {
                format!("-{}", digits)
            } else {
                digits
            }
        }
        'E' => scientific(value, precision.unwrap_or(6)),
        'P' => format!("{:.*} %", precision.unwrap_or(2), value * 100.0),
        _ => return Err(unsupported()),
    };
    Ok(text)
}

/// Exponent with an explicit sign and at least three digits: `1.23E+004`
fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:03}", mantissa, sign, exponent.abs())
        }
        None => raw,
    }
}

fn group_thousands(fixed: &str) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_fixed_and_grouped() {
        assert_eq!(format_number(10.0, "F2").unwrap(), "10.00");
        assert_eq!(format_number(3.14159, "f").unwrap(), "3.14");
        assert_eq!(format_number(1234567.891, "N2").unwrap(), "1,234,567.89");
        assert_eq!(format_number(-1234.0, "N0").unwrap(), "-1,234");
        assert_eq!(format_number(999.0, "N0").unwrap(), "999");
    }

    #[test]
    fn test_format_integer_scientific_percent() {
        assert_eq!(format_number(42.4, "D5").unwrap(), "00042");
        assert_eq!(format_number(-7.0, "D3").unwrap(), "-007");
        assert_eq!(format_number(12345.0, "E2").unwrap(), "1.23E+004");
        assert_eq!(format_number(0.00123, "E1").unwrap(), "1.2E-003");
        assert_eq!(format_number(0.256, "P1").unwrap(), "25.6 %");
    }

    #[test]
    fn test_format_rejects_bad_specs() {
        assert!(format_number(1.0, "Q2").is_err());
        assert!(format_number(1.0, "F31").is_err());
        assert!(format_number(1.0, "Fx").is_err());
        assert!(format_number(1.0, "F30").is_ok());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("  ")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([0])));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Template::parse("{{if .a}}x").unwrap_err(),
            TemplateError::UnterminatedBlock {
                tag: "if".to_string()
            }
        );
        assert_eq!(
            Template::parse("{{range .a}}x{{else}}y{{end}}").unwrap_err(),
            TemplateError::UnexpectedTag {
                tag: "else".to_string()
            }
        );
        assert_eq!(
            Template::parse("x{{end}}").unwrap_err(),
            TemplateError::UnexpectedTag {
                tag: "end".to_string()
            }
        );
    }
}
