// src/parse/mod.rs

//! Line-oriented, multi-line pattern matching over tool output.
//!
//! A [`LineRule`] is a sequence of regexes matched against consecutive
//! lines. The parser walks the text once; at each line the rules are tried in
//! order, the first full match wins and its lines are consumed.

use regex::Regex;

use crate::errors::{DicyError, Result};

#[derive(Debug, Clone)]
pub struct LineRule {
    name: String,
    patterns: Vec<Regex>,
}

impl LineRule {
    pub fn new(name: &str, patterns: &[&str]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(DicyError::ConfigError(format!(
                "line rule '{name}' needs at least one pattern"
            )));
        }
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    DicyError::ConfigError(format!("invalid pattern in line rule '{name}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            patterns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn match_at(&self, lines: &[&str], start: usize) -> Option<Vec<Vec<Option<String>>>> {
        if start + self.patterns.len() > lines.len() {
            return None;
        }
        self.patterns
            .iter()
            .zip(&lines[start..])
            .map(|(re, line)| {
                re.captures(line).map(|caps| {
                    caps.iter()
                        .map(|m| m.map(|m| m.as_str().to_string()))
                        .collect()
                })
            })
            .collect()
    }
}

/// One rule match with the 1-based, inclusive line range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub rule: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Capture groups per matched line; index 0 is the whole line match.
    pub captures: Vec<Vec<Option<String>>>,
}

impl LineMatch {
    /// Capture `group` of the `line`-th matched line.
    pub fn get(&self, line: usize, group: usize) -> Option<&str> {
        self.captures
            .get(line)
            .and_then(|groups| groups.get(group))
            .and_then(|g| g.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineParser {
    rules: Vec<LineRule>,
}

impl LineParser {
    pub fn new(rules: Vec<LineRule>) -> Self {
        Self { rules }
    }

    pub fn parse(&self, text: &str) -> Vec<LineMatch> {
        let lines: Vec<&str> = text.lines().collect();
        let mut matches = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let hit = self
                .rules
                .iter()
                .find_map(|rule| rule.match_at(&lines, i).map(|caps| (rule, caps)));
            match hit {
                Some((rule, captures)) => {
                    let len = captures.len();
                    matches.push(LineMatch {
                        rule: rule.name.clone(),
                        start_line: i + 1,
                        end_line: i + len,
                        captures,
                    });
                    i += len;
                }
                None => i += 1,
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_rules_consume_their_lines() {
        let parser = LineParser::new(vec![
            LineRule::new("error", &[r"^! (.*)$", r"^l\.(\d+)"]).unwrap(),
            LineRule::new("warning", &[r"^LaTeX Warning: (.*)$"]).unwrap(),
        ]);
        let text = "intro\n! Undefined control sequence.\nl.12 \\foo\nLaTeX Warning: Label(s) may have changed.\n";
        let matches = parser.parse(text);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].rule, "error");
        assert_eq!((matches[0].start_line, matches[0].end_line), (2, 3));
        assert_eq!(matches[0].get(0, 1), Some("Undefined control sequence."));
        assert_eq!(matches[0].get(1, 1), Some("12"));
        assert_eq!(matches[1].rule, "warning");
        assert_eq!(matches[1].start_line, 4);
    }

    #[test]
    fn partial_multi_line_match_falls_through() {
        let parser = LineParser::new(vec![
            LineRule::new("pair", &[r"^a$", r"^b$"]).unwrap(),
            LineRule::new("single", &[r"^a$"]).unwrap(),
        ]);
        let matches = parser.parse("a\nc\na\nb");
        let names: Vec<&str> = matches.iter().map(|m| m.rule.as_str()).collect();
        assert_eq!(names, vec!["single", "pair"]);
    }

    #[test]
    fn empty_rule_is_rejected() {
        assert!(LineRule::new("nothing", &[]).is_err());
    }
}
