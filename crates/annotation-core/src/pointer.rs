//! Slash-delimited pointers
//!
//! A pointer addresses a node either relative to an annotation element
//! (`/content/0/attributes/Path/value`), absolutely inside an annotation file
//! (`/targets/2/terms/0/content/1`), or inside a concrete XML document
//! (`/rootElement/subElements/1/subElements/0`). Segments follow JSON pointer
//! escaping: `~1` for `/` and `~0` for `~`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A parsed pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    /// The empty pointer, addressing the node it is resolved against
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a pointer; a missing leading slash is tolerated
    pub fn parse(text: &str) -> Self {
        let trimmed = text.strip_prefix('/').unwrap_or(text);
        if trimmed.is_empty() {
            return Self::root();
        }
        let segments = trimmed
            .split('/')
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect();
        Self { segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment in place
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Return a new pointer with one more segment
    pub fn child(&self, segment: impl ToString) -> Self {
        let mut next = self.clone();
        next.segments.push(segment.to_string());
        next
    }

    /// Return a new pointer with the segments of `other` appended
    pub fn join(&self, other: &Pointer) -> Self {
        let mut next = self.clone();
        next.segments.extend(other.segments.iter().cloned());
        next
    }

    /// Drop the last segment
    pub fn parent(&self) -> Option<Pointer> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Drop the last `count` segments
    pub fn ancestor(&self, count: usize) -> Option<Pointer> {
        if count > self.segments.len() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - count].to_vec(),
        })
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The last segment interpreted as an index
    pub fn last_index(&self) -> Option<usize> {
        self.last().and_then(|segment| segment.parse().ok())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Segment-wise prefix test (`/a/1` is not a prefix of `/a/10`)
    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True when `self` lies strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &Pointer) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    pub fn strip_prefix(&self, prefix: &Pointer) -> Option<Pointer> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Attribute name when the pointer ends in `attributes/<name>/value`
    /// or `attributes/<name>`
    pub fn attribute_name(&self) -> Option<&str> {
        let n = self.segments.len();
        if n >= 3 && self.segments[n - 3] == "attributes" && self.segments[n - 1] == "value" {
            return Some(&self.segments[n - 2]);
        }
        if n >= 2 && self.segments[n - 2] == "attributes" {
            return Some(&self.segments[n - 1]);
        }
        None
    }

    /// Pointer of the element owning the addressed attribute
    pub fn attribute_owner(&self) -> Option<Pointer> {
        let n = self.segments.len();
        if n >= 3 && self.segments[n - 3] == "attributes" && self.segments[n - 1] == "value" {
            return self.ancestor(3);
        }
        if n >= 2 && self.segments[n - 2] == "attributes" {
            return self.ancestor(2);
        }
        None
    }

    /// Pointer to the attribute itself, without a trailing `value` segment
    pub fn without_value_suffix(&self) -> Pointer {
        let n = self.segments.len();
        if n >= 3 && self.segments[n - 3] == "attributes" && self.segments[n - 1] == "value" {
            return self.ancestor(1).unwrap_or_default();
        }
        self.clone()
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Pointer {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for Pointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let pointer = Pointer::parse("/targets/0/terms/1");
        assert_eq!(pointer.len(), 4);
        assert_eq!(pointer.to_string(), "/targets/0/terms/1");
        assert_eq!(Pointer::parse("targets/0").to_string(), "/targets/0");
        assert!(Pointer::parse("").is_root());
        assert!(Pointer::parse("/").is_root());
    }

    #[test]
    fn test_escaping() {
        let pointer = Pointer::root().child("a/b").child("c~d");
        assert_eq!(pointer.to_string(), "/a~1b/c~0d");
        assert_eq!(Pointer::parse("/a~1b/c~0d"), pointer);
    }

    #[test]
    fn test_prefix_is_segment_aware() {
        let short = Pointer::parse("/content/1");
        let long = Pointer::parse("/content/10");
        assert!(!long.starts_with(&short));
        assert!(Pointer::parse("/content/1/content/0").is_descendant_of(&short));
        assert!(!short.is_descendant_of(&short));
    }

    #[test]
    fn test_attribute_helpers() {
        let pointer = Pointer::parse("/content/0/attributes/Path/value");
        assert_eq!(pointer.attribute_name(), Some("Path"));
        assert_eq!(
            pointer.attribute_owner().map(|p| p.to_string()),
            Some("/content/0".to_string())
        );
        assert_eq!(
            pointer.without_value_suffix().to_string(),
            "/content/0/attributes/Path"
        );
        assert_eq!(Pointer::parse("/content/0").attribute_name(), None);
    }
}
