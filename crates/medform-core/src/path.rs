//! Typed record paths.
//!
//! A [`Path`] is an ordered sequence of [`Segment`]s. The textual form is
//! dot-separated field names with bracketed array indexes, e.g.
//! `type.coding[0].code`. [`Path::join`] is the only way to concatenate paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// One step into a record node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object member by name.
    Field(String),
    /// Array element by position.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path, addressing the fragment root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Single-segment path for an object member.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Field(name.into())],
        }
    }

    /// Single-segment path for an array element.
    pub fn index(i: usize) -> Self {
        Self {
            segments: vec![Segment::Index(i)],
        }
    }

    /// Parse the textual form of a path.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        if text.is_empty() {
            return Ok(Self { segments });
        }

        for (n, part) in text.split('.').enumerate() {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }

            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if name.contains(']') {
                return Err(invalid("unbalanced ']'"));
            }
            if name.is_empty() && n > 0 {
                return Err(invalid("index must follow a field name"));
            }
            if !name.is_empty() {
                segments.push(Segment::Field(name.to_string()));
            }

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unterminated '['"))?;
                let digits = &rest[1..close];
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| invalid("array index must be a non-negative integer"))?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected text after ']'"));
                }
            }
        }

        Ok(Self { segments })
    }

    /// Parse a path literal embedded in source code.
    ///
    /// # Panics
    ///
    /// Panics if `text` is not a valid path. Only call this with compile-time
    /// constants (form definitions), where a panic indicates a definition bug.
    pub fn lit(text: &'static str) -> Self {
        Self::parse(text).unwrap_or_else(|e| panic!("bad path literal: {e}"))
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = Vec::with_capacity(self.segments.len() + other.segments.len());
        segments.extend_from_slice(&self.segments);
        segments.extend_from_slice(&other.segments);
        Path { segments }
    }

    pub fn segments(&self) -> &[Segment] {
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

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Path without its last segment. `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.segments.split_last()?;
        Some(Path {
            segments: init.to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (n, segment) in self.segments.iter().enumerate() {
            if n > 0 && matches!(segment, Segment::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Segment> for Path {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Path::parse(&text).map_err(serde::de::Error::custom)
    }
}
