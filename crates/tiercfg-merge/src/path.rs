//! Key paths into configuration documents.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A dotted path of mapping keys, e.g. `agents.planner.tools`.
///
/// The empty path addresses the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path. The empty string is the root.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// A new path one level deeper.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join("."))
    }
}

impl Serialize for KeyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.join("."))
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dotted = String::deserialize(deserializer)?;
        Ok(KeyPath::parse(&dotted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = KeyPath::parse("agents.planner.tools");
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "agents.planner.tools");
        assert_eq!(KeyPath::parse("").to_string(), "<root>");
    }

    #[test]
    fn test_child_does_not_mutate_parent() {
        let parent = KeyPath::parse("mcp_servers");
        let child = parent.child("github");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.segments(), &["mcp_servers", "github"]);
    }

    #[test]
    fn test_serde_as_dotted_string() {
        let path = KeyPath::parse("tools.web_search");
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!("tools.web_search"));
        let back: KeyPath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }
}
