//! # Topic Routing
//!
//! Hierarchical routing keys and the binding patterns queues use to select
//! them, following topic-exchange conventions: `*` matches exactly one
//! segment, `#` matches zero or more.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::fmt;

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// A validated dotted routing key, e.g. `adoption.approved` or
/// `pet.validation.response.<correlation-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Parse and validate a routing key.
    pub fn parse(key: impl Into<String>) -> Result<Self, BusError> {
        let key = key.into();
        if key.is_empty() || !key.split('.').all(valid_segment) {
            return Err(BusError::InvalidRoutingKey { key });
        }
        Ok(Self(key))
    }

    /// Construct from a key known valid at compile time (event contract
    /// constants and correlation-suffixed response keys).
    pub(crate) fn new_unchecked(key: String) -> Self {
        debug_assert!(key.split('.').all(valid_segment), "bad routing key: {key}");
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Last segment, where response keys carry the correlation id.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    /// `*`: exactly one segment.
    One,
    /// `#`: zero or more segments.
    Rest,
}

/// A queue binding pattern, e.g. `adoption.*` or `payment.#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPattern {
    source: String,
    segments: Vec<PatternSegment>,
}

impl BindingPattern {
    /// Parse and validate a binding pattern.
    pub fn parse(pattern: impl Into<String>) -> Result<Self, BusError> {
        let source = pattern.into();
        if source.is_empty() {
            return Err(BusError::InvalidPattern { pattern: source });
        }
        let mut segments = Vec::new();
        for part in source.split('.') {
            let segment = match part {
                "*" => PatternSegment::One,
                "#" => PatternSegment::Rest,
                literal if valid_segment(literal) => PatternSegment::Literal(literal.to_string()),
                _ => return Err(BusError::InvalidPattern { pattern: source }),
            };
            segments.push(segment);
        }
        Ok(Self { source, segments })
    }

    /// An exact-match pattern for a single routing key.
    #[must_use]
    pub fn exact(key: &RoutingKey) -> Self {
        Self {
            source: key.as_str().to_string(),
            segments: key
                .segments()
                .map(|s| PatternSegment::Literal(s.to_string()))
                .collect(),
        }
    }

    /// Whether the pattern selects this routing key.
    #[must_use]
    pub fn matches(&self, key: &RoutingKey) -> bool {
        let key_segments: Vec<&str> = key.segments().collect();
        Self::match_from(&self.segments, &key_segments)
    }

    fn match_from(pattern: &[PatternSegment], key: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((PatternSegment::Literal(lit), rest)) => key
                .split_first()
                .is_some_and(|(head, tail)| head == lit && Self::match_from(rest, tail)),
            Some((PatternSegment::One, rest)) => key
                .split_first()
                .is_some_and(|(_, tail)| Self::match_from(rest, tail)),
            Some((PatternSegment::Rest, rest)) => (0..=key.len())
                .any(|skip| Self::match_from(rest, &key[skip..])),
        }
    }
}

impl fmt::Display for BindingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
