//! Replay scripts.
//!
//! One action per line, `#` starts a comment:
//!
//! ```text
//! focus
//! field status
//! operator eq
//! value active
//! connector or
//! complete | blur | clear | reset | delete
//! ```

use anyhow::{bail, Result};
use filterbar::Connector;

/// One parsed script line. Keys and values are resolved at replay time,
/// against the machine's current field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    Focus,
    Field(String),
    Operator(String),
    Value(String),
    Connector(Connector),
    Complete,
    Blur,
    Clear,
    Reset,
    Delete,
}

/// Parses a script into `(line number, line)` pairs. Line numbers are
/// 1-based; blank and comment lines are skipped.
pub fn parse_script(text: &str) -> Result<Vec<(usize, ScriptLine)>> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let needs_arg = |what: &str| -> Result<String> {
            if rest.is_empty() {
                bail!("line {}: '{}' needs a {}", number, word, what);
            }
            Ok(rest.to_string())
        };
        let parsed = match word.to_ascii_lowercase().as_str() {
            "focus" => ScriptLine::Focus,
            "field" => ScriptLine::Field(needs_arg("field key")?),
            "operator" | "op" => ScriptLine::Operator(needs_arg("operator key")?),
            "value" => ScriptLine::Value(rest.to_string()),
            "connector" => match Connector::parse(rest) {
                Some(connector) => ScriptLine::Connector(connector),
                None => bail!("line {}: expected AND or OR, got '{}'", number, rest),
            },
            "complete" => ScriptLine::Complete,
            "blur" => ScriptLine::Blur,
            "clear" => ScriptLine::Clear,
            "reset" => ScriptLine::Reset,
            "delete" => ScriptLine::Delete,
            _ => bail!("line {}: unknown action '{}'", number, word),
        };
        lines.push((number, parsed));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions_and_skips_comments() {
        let script = "# build one condition\nfocus\nfield status\n\nop eq  # short form\nvalue Active Now\nconnector or\n";
        let lines = parse_script(script).unwrap();
        assert_eq!(
            lines,
            vec![
                (2, ScriptLine::Focus),
                (3, ScriptLine::Field("status".into())),
                (5, ScriptLine::Operator("eq".into())),
                (6, ScriptLine::Value("Active Now".into())),
                (7, ScriptLine::Connector(Connector::Or)),
            ]
        );
    }

    #[test]
    fn empty_value_is_allowed() {
        assert_eq!(
            parse_script("value").unwrap(),
            vec![(1, ScriptLine::Value(String::new()))]
        );
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_script("focus\njump").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_script("field").unwrap_err();
        assert!(err.to_string().contains("needs a field key"));

        assert!(parse_script("connector xor").is_err());
    }
}
