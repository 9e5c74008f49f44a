//! Lexing and parsing of the per-tile trigger script syntax.
//!
//! Map properties hold one command per value, e.g.
//! `"is player_moved"` (condition) or `"dialog Hello, traveler"` (action).
//! Conditions lead with an `is` / `is_not` operator; everything after the
//! command name is a comma-separated argument list where `\,` escapes a
//! literal comma. A handful of commands carry free-form text and are never
//! comma-split.

pub mod schema;

use std::cmp::Ordering;

use thiserror::Error;

/// Commands whose remaining text is one argument, never comma-split.
/// Dialog lines and music paths legitimately contain commas.
const NO_SPLIT: &[&str] = &[
    "dialog",
    "dialog_chain",
    "translated_dialog",
    "translated_dialog_chain",
    "play_music",
    "music_playing",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("empty script string")]
    Empty,
    #[error("condition is missing a predicate name: '{text}'")]
    MissingConditionName { text: String },
    #[error("bad condition operator '{found}', expected 'is' or 'is_not'")]
    BadOperator { found: String },
    #[error("unknown behavior '{name}'")]
    UnknownBehavior { name: String },
    #[error("unrecognized event property '{key}'")]
    UnknownProperty { key: String },
    #[error("{kind} '{name}': {source}")]
    Parameters {
        kind: &'static str,
        name: String,
        source: schema::ParamError,
    },
}

/// Whether a condition expects its predicate to hold or to fail.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Is,
    IsNot,
}

impl Operator {
    pub fn parse(s: &str) -> Result<Self, ScriptError> {
        match s {
            "is" => Ok(Self::Is),
            "is_not" => Ok(Self::IsNot),
            other => Err(ScriptError::BadOperator {
                found: other.to_string(),
            }),
        }
    }
}

/// Split on the delimiter, honoring backslash escapes for literal
/// delimiters. Each piece is whitespace-trimmed.
pub fn split_escaped(text: &str, delimiter: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delimiter) {
            current.push(delimiter);
            chars.next();
        } else if c == delimiter {
            pieces.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }
    pieces.push(current.trim().to_string());
    pieces
}

fn split_arguments(name: &str, rest: Option<&str>) -> Vec<String> {
    match rest.map(str::trim).filter(|r| !r.is_empty()) {
        None => Vec::new(),
        Some(rest) => {
            if NO_SPLIT.contains(&name) {
                vec![rest.to_string()]
            } else {
                split_escaped(rest, ',')
            }
        }
    }
}

/// `"teleport cave,4,9"` -> `("teleport", ["cave", "4", "9"])`.
pub fn parse_action_string(text: &str) -> Result<(String, Vec<String>), ScriptError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ScriptError::Empty);
    }
    let mut words = text.splitn(2, ' ');
    let name = words.next().unwrap_or_default().to_string();
    let args = split_arguments(&name, words.next());
    Ok((name, args))
}

/// `"is party_size greater_than,0"` ->
/// `(Is, "party_size", ["greater_than", "0"])`.
pub fn parse_condition_string(text: &str) -> Result<(Operator, String, Vec<String>), ScriptError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ScriptError::Empty);
    }
    let mut words = text.splitn(3, ' ');
    let operator = Operator::parse(words.next().unwrap_or_default())?;
    let name = words
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ScriptError::MissingConditionName {
            text: text.to_string(),
        })?
        .to_string();
    let args = split_arguments(&name, words.next());
    Ok((operator, name, args))
}

/// `"talk npc_oak"` -> `("talk", ["npc_oak"])`.
pub fn parse_behav_string(text: &str) -> Result<(String, Vec<String>), ScriptError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ScriptError::Empty);
    }
    let mut words = text.splitn(2, ' ');
    let name = words.next().unwrap_or_default().to_string();
    let args = match words.next().map(str::trim).filter(|r| !r.is_empty()) {
        None => Vec::new(),
        Some(rest) => split_escaped(rest, ','),
    };
    Ok((name, args))
}

/// Natural-order comparison, so `cond2` sorts before `cond10`. Digit runs
/// compare numerically, everything else byte-wise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ca.cmp(&cb) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = iter.peek().copied() {
        if let Some(digit) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(digit as u64);
            iter.next();
        } else {
            break;
        }
    }
    value
}
