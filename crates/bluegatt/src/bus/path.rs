//! Hierarchical object paths
//!
//! Paths are `/`-delimited ASCII segment sequences ("/com/dosell/service/1").
//! The root path is "/" and has no segments.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectPath {
    segments: Vec<String>,
}

impl ObjectPath {
    /// The root path "/"
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string. Empty segments and non-ASCII characters are
    /// rejected.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with('/') || !text.is_ascii() {
            return None;
        }
        if text == "/" {
            return Some(Self::root());
        }

        let mut segments = Vec::new();
        for segment in text[1..].split('/') {
            if segment.is_empty() {
                return None;
            }
            segments.push(segment.to_string());
        }
        Some(Self { segments })
    }

    /// Append one or more segments ("service/1" appends two segments)
    pub fn join(&self, tail: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            tail.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        );
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `self` is a proper ancestor of `other`
    pub fn is_ancestor_of(&self, other: &ObjectPath) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = ObjectPath::parse("/com/dosell/service/1").unwrap();
        assert_eq!(path.segments().len(), 4);
        assert_eq!(path.to_string(), "/com/dosell/service/1");
        assert_eq!(ObjectPath::root().to_string(), "/");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ObjectPath::parse("com/dosell").is_none());
        assert!(ObjectPath::parse("/com//dosell").is_none());
        assert!(ObjectPath::parse("/é").is_none());
    }

    #[test]
    fn test_join_and_ancestry() {
        let root = ObjectPath::parse("/com/dosell").unwrap();
        let child = root.join("service/1");
        assert_eq!(child.to_string(), "/com/dosell/service/1");
        assert!(root.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&root));
        assert!(!root.is_ancestor_of(&root));
    }
}
