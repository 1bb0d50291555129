//! Structured filters and updates handed to a [`DocumentStore`].
//!
//! Every backend evaluates the same [`Filter`] through [`Filter::evaluate`];
//! none of them translate it into a native query language.
//!
//! [`DocumentStore`]: crate::repository::DocumentStore

use std::cmp::Ordering;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::document::Document;

/// Compiled regular expression plus the source it was built from.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Pattern matching `term` as a literal substring: every metacharacter in
    /// the caller's text is escaped.
    pub fn literal(term: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        Self::new(&regex::escape(term), case_insensitive)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

#[derive(Clone, Debug)]
pub enum Operator {
    Eq,
    Gte,
    Lte,
    Matches(Pattern),
}

#[derive(Clone, Debug)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

#[derive(Clone, Debug, Default)]
pub enum Filter {
    #[default]
    Empty,
    Condition(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: Value) -> Self {
        Self::condition(field, Operator::Eq, value)
    }

    pub fn gte(field: &str, value: Value) -> Self {
        Self::condition(field, Operator::Gte, value)
    }

    pub fn lte(field: &str, value: Value) -> Self {
        Self::condition(field, Operator::Lte, value)
    }

    pub fn matches(field: &str, pattern: Pattern) -> Self {
        Self::condition(field, Operator::Matches(pattern), Value::Null)
    }

    /// `lower <= field <= upper`.
    pub fn between(field: &str, lower: Value, upper: Value) -> Self {
        Self::And(vec![Self::gte(field, lower), Self::lte(field, upper)])
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::Empty => other,
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            filter => Filter::And(vec![filter, other]),
        }
    }

    fn condition(field: &str, op: Operator, value: Value) -> Self {
        Filter::Condition(Condition {
            field: field.to_string(),
            op,
            value,
        })
    }

    pub fn evaluate(&self, document: &Document) -> bool {
        match self {
            Filter::Empty => true,
            Filter::Condition(condition) => condition.evaluate(document),
            Filter::And(filters) => filters.iter().all(|filter| filter.evaluate(document)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.evaluate(document)),
        }
    }
}

impl Condition {
    fn evaluate(&self, document: &Document) -> bool {
        let actual = document.get(&self.field).unwrap_or(&Value::Null);
        match &self.op {
            Operator::Eq => compare(actual, &self.value) == Some(Ordering::Equal),
            Operator::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Matches(pattern) => match actual {
                Value::String(text) => pattern.is_match(text),
                Value::Number(number) => pattern.is_match(&number_text(number)),
                _ => false,
            },
        }
    }
}

/// Ordering between two stored values. Numbers compare numerically whatever
/// their encoding, strings lexicographically; mixed kinds are incomparable.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Textual form used when a pattern is applied to a numeric field: `21.5`,
/// `20` (not `20.0`), `-3.25`.
pub fn number_text(number: &serde_json::Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    match number.as_f64() {
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

#[derive(Clone, Debug, Default)]
pub struct Update {
    assignments: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: Value) -> Self {
        self.assignments.push((field.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.assignments {
            document.insert(field.clone(), value.clone());
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// First matching document in natural order.
    One,
    Many,
}
