//! Declarative parameter schemas for map-script actions and conditions.
//!
//! Every action and condition declares an ordered list of [`ParamSpec`]s.
//! One generic routine validates the raw string arguments from the map
//! against that list and produces typed values, so individual
//! implementations never touch unchecked casts.

use thiserror::Error;

use crate::components::Direction;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Direction,
}

impl ParamKind {
    fn label(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "number",
            Self::Direction => "direction",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub optional: bool,
}

/// Shorthand constructors keep the per-action schema tables readable.
pub const fn req(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        optional: false,
    }
}

pub const fn opt(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        optional: true,
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing required parameter '{name}'")]
    Missing { name: &'static str },
    #[error("expected at most {expected} parameters, got {got}")]
    TooMany { expected: usize, got: usize },
    #[error("parameter '{name}' expected {expected}, got '{value}'")]
    BadType {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Direction(Direction),
    Absent,
}

/// Typed view over one parsed parameter list. Indexes follow the schema
/// order. Accessors for required slots assume validation already ran and
/// fall back to inert defaults, so they cannot panic on malformed input
/// that slipped past a registry without a schema.
#[derive(Clone, Debug, Default)]
pub struct Params(Vec<ParamValue>);

impl Params {
    pub fn string(&self, index: usize) -> String {
        match self.0.get(index) {
            Some(ParamValue::Str(s)) => s.clone(),
            Some(ParamValue::Int(n)) => n.to_string(),
            Some(ParamValue::Float(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn string_opt(&self, index: usize) -> Option<String> {
        match self.0.get(index) {
            Some(ParamValue::Absent) | None => None,
            _ => Some(self.string(index)),
        }
    }

    pub fn int(&self, index: usize) -> i64 {
        match self.0.get(index) {
            Some(ParamValue::Int(n)) => *n,
            _ => 0,
        }
    }

    pub fn int_opt(&self, index: usize) -> Option<i64> {
        match self.0.get(index) {
            Some(ParamValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, index: usize) -> f64 {
        match self.0.get(index) {
            Some(ParamValue::Float(n)) => *n,
            Some(ParamValue::Int(n)) => *n as f64,
            _ => 0.0,
        }
    }

    pub fn float_opt(&self, index: usize) -> Option<f64> {
        match self.0.get(index) {
            Some(ParamValue::Float(n)) => Some(*n),
            Some(ParamValue::Int(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn direction(&self, index: usize) -> Direction {
        self.direction_opt(index).unwrap_or_default()
    }

    pub fn direction_opt(&self, index: usize) -> Option<Direction> {
        match self.0.get(index) {
            Some(ParamValue::Direction(d)) => Some(*d),
            _ => None,
        }
    }
}

/// Validate `raw` against `schema` and produce typed values.
///
/// Empty strings count as absent, so a trailing `act1 teleport map,,5`
/// style hole behaves like an omitted optional.
pub fn parse_params(schema: &[ParamSpec], raw: &[String]) -> Result<Params, ParamError> {
    if raw.len() > schema.len() {
        return Err(ParamError::TooMany {
            expected: schema.len(),
            got: raw.len(),
        });
    }

    let mut values = Vec::with_capacity(schema.len());
    for (i, spec) in schema.iter().enumerate() {
        let raw_value = raw.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());
        match raw_value {
            None => {
                if spec.optional {
                    values.push(ParamValue::Absent);
                } else {
                    return Err(ParamError::Missing { name: spec.name });
                }
            }
            Some(text) => values.push(parse_one(spec, text)?),
        }
    }
    Ok(Params(values))
}

fn parse_one(spec: &ParamSpec, text: &str) -> Result<ParamValue, ParamError> {
    let bad = || ParamError::BadType {
        name: spec.name,
        expected: spec.kind.label(),
        value: text.to_string(),
    };
    match spec.kind {
        ParamKind::Str => Ok(ParamValue::Str(text.to_string())),
        ParamKind::Int => text.parse::<i64>().map(ParamValue::Int).map_err(|_| bad()),
        ParamKind::Float => text.parse::<f64>().map(ParamValue::Float).map_err(|_| bad()),
        ParamKind::Direction => Direction::parse(text)
            .map(ParamValue::Direction)
            .ok_or_else(bad),
    }
}
