//! Structural schema for configuration fragments.
//!
//! The schema knows nothing about what keys mean. It only pins the *shape*
//! of selected paths so that a mapping never shows up where a flag set or a
//! keyed collection is expected, and it bounds document nesting.
//!
//! Patterns are dotted paths where `*` matches any single segment:
//!
//! ```text
//! mcp_servers        keyed collection (mapping of mappings)
//! agents.*.tools     flag set (mapping of booleans)
//! ```

use std::fmt;

use crate::error::{SchemaViolation, ViolationReason};
use crate::path::KeyPath;
use crate::value::{Scalar, Value};

/// Maximum nesting depth of a fragment below its root mapping.
pub const MAX_DOCUMENT_DEPTH: usize = 64;

/// Keyed collections present in every default schema.
pub const DEFAULT_KEYED_COLLECTIONS: &[&str] = &["mcp_servers", "integrations"];

/// Flag sets present in every default schema.
pub const DEFAULT_FLAG_SETS: &[&str] = &["tools", "agents.*.tools"];

/// Shape required at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Mapping,
    Sequence,
    Scalar,
    Bool,
    /// Mapping whose entries are configuration objects keyed by a stable id.
    KeyedCollection,
    /// Mapping of enable/disable flags.
    FlagSet,
}

impl Shape {
    fn expected(&self) -> &'static str {
        match self {
            Shape::Mapping | Shape::KeyedCollection | Shape::FlagSet => "mapping",
            Shape::Sequence => "sequence",
            Shape::Scalar => "scalar",
            Shape::Bool => "boolean",
        }
    }

    fn fits(&self, value: &Value) -> bool {
        match self {
            Shape::Mapping | Shape::KeyedCollection | Shape::FlagSet => {
                matches!(value, Value::Mapping(_))
            }
            Shape::Sequence => matches!(value, Value::Sequence(_)),
            Shape::Scalar => value.is_scalar(),
            Shape::Bool => matches!(value, Value::Scalar(Scalar::Bool(_))),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Mapping => "mapping",
            Shape::Sequence => "sequence",
            Shape::Scalar => "scalar",
            Shape::Bool => "boolean",
            Shape::KeyedCollection => "keyed collection",
            Shape::FlagSet => "flag set",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Any,
}

/// Dotted path pattern with `*` wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern(Vec<Segment>);

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        Self(
            pattern
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if s == "*" {
                        Segment::Any
                    } else {
                        Segment::Key(s.to_string())
                    }
                })
                .collect(),
        )
    }

    pub fn matches(&self, path: &KeyPath) -> bool {
        self.0.len() == path.len() && self.leads_with(path)
    }

    /// True when `path` is this pattern or a non-empty prefix of it.
    pub fn covers(&self, path: &KeyPath) -> bool {
        !path.is_root() && path.len() <= self.0.len() && self.leads_with(path)
    }

    fn leads_with(&self, path: &KeyPath) -> bool {
        self.0
            .iter()
            .zip(path.segments())
            .all(|(pattern, segment)| match pattern {
                Segment::Any => true,
                Segment::Key(key) => key == segment,
            })
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Any => "*",
                Segment::Key(k) => k.as_str(),
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}

/// A shape pinned to a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRule {
    pub pattern: PathPattern,
    pub shape: Shape,
}

/// Set of shape rules. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<ShapeRule>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::from_lists(DEFAULT_KEYED_COLLECTIONS, DEFAULT_FLAG_SETS)
    }
}

impl Schema {
    /// A schema with no path rules; only structural limits apply.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn new(rules: Vec<ShapeRule>) -> Self {
        Self { rules }
    }

    /// Build from lists of keyed-collection and flag-set patterns.
    pub fn from_lists<K, F>(keyed_collections: &[K], flag_sets: &[F]) -> Self
    where
        K: AsRef<str>,
        F: AsRef<str>,
    {
        let mut schema = Self::empty();
        for pattern in keyed_collections {
            schema = schema.with_rule(pattern.as_ref(), Shape::KeyedCollection);
        }
        for pattern in flag_sets {
            schema = schema.with_rule(pattern.as_ref(), Shape::FlagSet);
        }
        schema
    }

    pub fn with_rule(mut self, pattern: &str, shape: Shape) -> Self {
        self.rules.push(ShapeRule {
            pattern: PathPattern::parse(pattern),
            shape,
        });
        self
    }

    pub fn rules(&self) -> &[ShapeRule] {
        &self.rules
    }

    /// Patterns carrying `shape`, in rule order.
    pub fn patterns(&self, shape: Shape) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.shape == shape)
            .map(|rule| rule.pattern.to_string())
            .collect()
    }

    pub fn shape_at(&self, path: &KeyPath) -> Option<Shape> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.shape)
    }

    pub fn is_keyed_collection(&self, path: &KeyPath) -> bool {
        self.shape_at(path) == Some(Shape::KeyedCollection)
    }

    /// Whether `path` is a flag set or lies on the way to one
    /// (`agents`, `agents.planner` for `agents.*.tools`).
    pub fn guards_flag_set(&self, path: &KeyPath) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.shape == Shape::FlagSet && rule.pattern.covers(path))
    }

    /// Check a fragment against the structural limits and shape rules.
    ///
    /// The root must be a mapping. An explicit `null` satisfies any shape
    /// except at a flag set or a mapping holding one, and inside a flag set
    /// every entry must be a boolean.
    pub fn validate(&self, fragment: &Value) -> Result<(), SchemaViolation> {
        if !matches!(fragment, Value::Mapping(_)) {
            return Err(SchemaViolation::new(
                KeyPath::root(),
                ViolationReason::KindMismatch {
                    expected: "mapping",
                    found: fragment.kind(),
                },
            ));
        }

        let mut stack: Vec<(&Value, KeyPath)> = vec![(fragment, KeyPath::root())];
        while let Some((value, path)) = stack.pop() {
            if path.len() > MAX_DOCUMENT_DEPTH {
                return Err(SchemaViolation::new(
                    path,
                    ViolationReason::TooDeep {
                        max: MAX_DOCUMENT_DEPTH,
                    },
                ));
            }

            match value {
                Value::Mapping(map) => {
                    for (key, child) in map {
                        if key.is_empty() {
                            return Err(SchemaViolation::new(path, ViolationReason::EmptyKey));
                        }
                        let child_path = path.child(key.as_str());
                        if child.is_null() && self.guards_flag_set(&child_path) {
                            return Err(SchemaViolation::new(
                                child_path,
                                ViolationReason::ClearsFlags,
                            ));
                        }
                        if let Some(shape) = self.shape_at(&child_path) {
                            Self::check_shape(shape, child, &child_path)?;
                        }
                        stack.push((child, child_path));
                    }
                }
                Value::Sequence(items) => {
                    for (i, item) in items.iter().enumerate() {
                        stack.push((item, path.child(format!("[{}]", i))));
                    }
                }
                Value::Scalar(_) => {}
            }
        }
        Ok(())
    }

    fn check_shape(shape: Shape, value: &Value, path: &KeyPath) -> Result<(), SchemaViolation> {
        if value.is_null() {
            return Ok(());
        }
        if !shape.fits(value) {
            return Err(SchemaViolation::new(
                path.clone(),
                ViolationReason::KindMismatch {
                    expected: shape.expected(),
                    found: value.kind(),
                },
            ));
        }

        let (entry_shape, allow_null) = match shape {
            Shape::KeyedCollection => (Shape::Mapping, true),
            Shape::FlagSet => (Shape::Bool, false),
            _ => return Ok(()),
        };
        if let Value::Mapping(entries) = value {
            for (key, entry) in entries {
                if allow_null && entry.is_null() {
                    continue;
                }
                if !entry_shape.fits(entry) {
                    return Err(SchemaViolation::new(
                        path.child(key.as_str()),
                        ViolationReason::KindMismatch {
                            expected: entry_shape.expected(),
                            found: entry.kind(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}
